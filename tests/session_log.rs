use paintcore::{IdleLoop, Image, ImageMap, ImageType, PixelChunk, PixelChunkMut, logger};

fn copy(src: &PixelChunk<'_>, dst: &mut PixelChunkMut<'_>) {
    for row in 0..src.height() as usize {
        dst.row_mut(row).copy_from_slice(src.row(row));
    }
}

// Logger state is process wide, so this file holds a single test
#[test]
fn test_depth_change_is_logged_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.log");
    logger::init(Some(&path)).unwrap();
    assert_eq!(logger::log_path(), Some(&path));

    let image = Image::new(8, 8, ImageType::Gray);
    let d = Image::add_drawable(&image, "Background", ImageType::Gray, (0, 0));
    let idle = IdleLoop::new();
    let mut map = ImageMap::new(d.clone(), false, &idle).unwrap();
    map.apply(copy);
    idle.run_until_idle(usize::MAX);
    image.borrow_mut().convert_drawable(d.id(), ImageType::RgbA);
    assert!(map.clear().is_err());

    let log = std::fs::read_to_string(&path).unwrap();
    let errors: Vec<&str> = log.lines().filter(|l| l.contains("[ERROR]")).collect();
    assert_eq!(errors.len(), 1, "{}", log);
    assert!(errors[0].ends_with("image depth change, unable to restore original image"));
}
