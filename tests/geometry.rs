use nexus_autodl::{BoundingBox, Monitor, ScreenMapper};

fn monitor(x: i32, y: i32, width: u32, height: u32) -> Monitor {
    Monitor::new(x, y, width, height).unwrap()
}

#[test]
fn side_by_side_monitors_span_one_region() {
    let mapper = ScreenMapper::new(
        vec![monitor(0, 0, 1920, 1080), monitor(1920, 0, 1920, 1080)],
        false,
    )
    .unwrap();

    let region = mapper.capture_region();
    assert_eq!(region.left, 0);
    assert_eq!(region.top, 0);
    assert_eq!(region.width, 3840);
    assert_eq!(region.height, 1080);
}

#[test]
fn monitor_left_of_primary_extends_the_region_negative() {
    let mapper = ScreenMapper::new(
        vec![monitor(-1920, 0, 1920, 1080), monitor(0, 0, 1920, 1080)],
        false,
    )
    .unwrap();

    let region = mapper.capture_region();
    assert_eq!(region.left, -1920);
    assert_eq!(region.width, 3840);
    assert!(mapper.monitors()[0].is_left_of_primary());
}

#[test]
fn force_primary_ignores_secondary_monitors() {
    let monitors = vec![
        monitor(0, 0, 2560, 1440),
        monitor(2560, -200, 1920, 1080),
        monitor(-1920, 0, 1920, 1080),
    ];
    let mapper = ScreenMapper::new(monitors, true).unwrap();

    let region = mapper.capture_region();
    assert_eq!(region.left, 0);
    assert_eq!(region.top, 0);
    assert_eq!(region.width, 2560);
    assert_eq!(region.height, 1440);
}

#[test]
fn single_monitor_region_is_its_own_bounds() {
    let mapper = ScreenMapper::new(vec![monitor(100, 50, 1280, 720)], false).unwrap();
    let region = mapper.capture_region();
    assert_eq!((region.left, region.top), (100, 50));
    assert_eq!((region.width, region.height), (1280, 720));
}

#[test]
fn coordinate_conversion_round_trips_exactly() {
    let layouts = [
        vec![monitor(0, 0, 1920, 1080)],
        vec![monitor(0, 0, 1920, 1080), monitor(1920, 0, 1920, 1080)],
        vec![monitor(-1920, -300, 1920, 1080), monitor(0, 0, 2560, 1440)],
    ];

    for monitors in layouts {
        let mapper = ScreenMapper::new(monitors, false).unwrap();
        for (x, y) in [(0, 0), (17, 43), (1919, 1079), (-5, 999), (3000, 12)] {
            let (mx, my) = mapper.image_to_monitor(x, y);
            assert_eq!(mapper.monitor_to_image(mx, my), (x, y));

            let (ix, iy) = mapper.monitor_to_image(x, y);
            assert_eq!(mapper.image_to_monitor(ix, iy), (x, y));
        }
    }
}

#[test]
fn empty_monitor_list_fails_construction() {
    assert!(ScreenMapper::new(Vec::new(), false).is_err());
    assert!(ScreenMapper::new(Vec::new(), true).is_err());
}

#[test]
fn bounding_box_invariants_hold() {
    assert!(BoundingBox::new(0, 0, 10, 10).is_ok());
    assert!(BoundingBox::new(10, 0, 10, 10).is_err());
    assert!(BoundingBox::new(0, 10, 10, 10).is_err());
    assert!(BoundingBox::new(11, 0, 10, 10).is_err());
    assert!(BoundingBox::new(0, 11, 10, 10).is_err());

    let bbox = BoundingBox::new(-20, -10, 20, 10).unwrap();
    assert_eq!(bbox.width(), 40);
    assert_eq!(bbox.height(), 20);

    let padded = bbox.pad(0.25).unwrap();
    assert_eq!(
        (padded.x1(), padded.y1(), padded.x2(), padded.y2()),
        (-10, -5, 10, 5)
    );
}
