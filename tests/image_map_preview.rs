use std::cell::RefCell;
use std::rc::Rc;

use paintcore::ops::adjustments;
use paintcore::{
    DrawableRef, IdleLoop, Image, ImageEvent, ImageMap, ImageMapError, ImageType, PixelChunk, PixelChunkMut, Rect,
    SharedImage,
};

// Gray image with a deterministic ramp so every pixel is distinguishable
fn gradient_image(width: u32, height: u32) -> (SharedImage, DrawableRef) {
    let image = Image::new(width, height, ImageType::Gray);
    let drawable = Image::add_drawable(&image, "Background", ImageType::Gray, (0, 0));
    let data: Vec<u8> = (0..height)
        .flat_map(|y| (0..width).map(move |x| ((x * 7 + y * 3) % 240) as u8))
        .collect();
    image
        .borrow_mut()
        .drawable_mut(drawable.id())
        .unwrap()
        .tiles_mut()
        .write_rect(Rect::new(0, 0, width, height), &data);
    (image, drawable)
}

fn pixels(image: &SharedImage, drawable: &DrawableRef) -> Vec<u8> {
    image.borrow().drawable(drawable.id()).unwrap().tiles().to_raw()
}

fn add_one(src: &PixelChunk<'_>, dst: &mut PixelChunkMut<'_>) {
    for row in 0..src.height() as usize {
        for (o, i) in dst.row_mut(row).iter_mut().zip(src.row(row)) {
            *o = i.saturating_add(1);
        }
    }
}

#[test]
fn test_reapply_does_not_accumulate() {
    let (image, d) = gradient_image(150, 90);
    let idle = IdleLoop::new();
    let mut map = ImageMap::new(d.clone(), true, &idle).unwrap();

    map.apply(adjustments::brightness_contrast(10.0, 0.0));
    idle.run_until_idle(usize::MAX);
    let once = pixels(&image, &d);

    map.apply(adjustments::brightness_contrast(10.0, 0.0));
    idle.run_until_idle(usize::MAX);
    assert_eq!(pixels(&image, &d), once);

    // Interrupting a pass and re-applying also starts from the snapshot
    map.apply(adjustments::brightness_contrast(10.0, 0.0));
    idle.iterate();
    map.apply(adjustments::brightness_contrast(10.0, 0.0));
    idle.run_until_idle(usize::MAX);
    assert_eq!(pixels(&image, &d), once);
    map.abort();
}

#[test]
fn test_commit_drains_to_the_same_result() {
    let (idle_image, idle_d) = gradient_image(150, 90);
    let (commit_image, commit_d) = gradient_image(150, 90);
    let selection = Rect::new(20, 10, 100, 70);
    idle_image.borrow_mut().set_selection_rect(selection);
    commit_image.borrow_mut().set_selection_rect(selection);

    let idle = IdleLoop::new();
    let mut natural = ImageMap::new(idle_d.clone(), true, &idle).unwrap();
    natural.apply(adjustments::invert());
    idle.run_until_idle(usize::MAX);
    let finished = pixels(&idle_image, &idle_d);

    let mut drained = ImageMap::new(commit_d.clone(), true, &idle).unwrap();
    drained.apply(adjustments::invert());
    assert!(drained.is_busy());
    drained.commit();

    assert_eq!(pixels(&commit_image, &commit_d), finished);
    natural.commit();
    assert_eq!(pixels(&idle_image, &idle_d), finished);
}

#[test]
fn test_abort_restores_original_pixels() {
    let (image, d) = gradient_image(150, 90);
    let original = pixels(&image, &d);
    let idle = IdleLoop::new();
    let mut map = ImageMap::new(d.clone(), true, &idle).unwrap();

    map.apply(add_one);
    idle.iterate();
    assert_ne!(pixels(&image, &d), original);

    map.abort();
    assert_eq!(pixels(&image, &d), original);
    assert_eq!(idle.pending(), 0);
    let img = image.borrow();
    assert!(!img.undo_stack().is_frozen());
    assert_eq!(img.undo_stack().undo_count(), 0);
}

#[test]
fn test_new_selection_size_takes_fresh_snapshot() {
    let (image, d) = gradient_image(150, 90);
    let idle = IdleLoop::new();
    let mut map = ImageMap::new(d.clone(), true, &idle).unwrap();

    let a = Rect::new(10, 10, 100, 60);
    image.borrow_mut().set_selection_rect(a);
    map.apply(add_one);
    idle.run_until_idle(usize::MAX);
    assert_eq!(map.undo_bounds(), Some(a));

    let b = Rect::new(30, 20, 40, 30);
    image.borrow_mut().set_selection_rect(b);
    let expected = image.borrow().drawable(d.id()).unwrap().tiles().read_rect(b);
    map.apply(add_one);

    assert_eq!(map.undo_bounds(), Some(b));
    let snapshot = map.undo_snapshot().unwrap();
    assert_eq!((snapshot.width(), snapshot.height()), (b.width, b.height));
    assert_eq!(snapshot.to_raw(), expected);
    map.abort();
}

#[test]
fn test_constant_fill_then_clear() {
    let image = Image::new(4, 4, ImageType::Gray);
    let d = Image::add_drawable(&image, "Layer", ImageType::Gray, (0, 0));

    let idle = IdleLoop::new();
    let mut map = ImageMap::new(d.clone(), false, &idle).unwrap();
    map.apply(adjustments::fill(vec![77]));
    assert_eq!(idle.run_until_idle(usize::MAX), 1);

    assert_eq!(pixels(&image, &d), vec![77; 16]);
    // Colour sampling still reports what was there before the preview
    assert_eq!(map.get_color_at(2, 2).unwrap().rgba.0, [0, 0, 0, 255]);

    let map = map.clear().unwrap();
    assert_eq!(pixels(&image, &d), vec![0; 16]);
    assert!(image.borrow().undo_stack().is_frozen());
    map.abort();
    assert!(!image.borrow().undo_stack().is_frozen());
}

#[test]
fn test_fill_keeps_alpha_layout() {
    let image = Image::new(4, 4, ImageType::RgbA);
    let d = Image::add_drawable(&image, "Layer", ImageType::RgbA, (0, 0));
    image.borrow_mut().drawable_mut(d.id()).unwrap().tiles_mut().fill(&[10, 20, 30, 255]);

    let idle = IdleLoop::new();
    let mut map = ImageMap::new(d.clone(), false, &idle).unwrap();
    map.apply(adjustments::fill(vec![200, 100, 50]));
    map.commit();
    assert!(pixels(&image, &d).chunks_exact(4).all(|p| p == [200, 100, 50, 255]));
}

#[test]
fn test_depth_change_disposes_the_map() {
    let (image, d) = gradient_image(8, 8);
    let messages = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&messages);
    image.borrow_mut().connect(move |event| {
        if let ImageEvent::Message(text) = event {
            sink.borrow_mut().push(text.clone());
        }
    });

    let idle = IdleLoop::new();
    let mut map = ImageMap::new(d.clone(), true, &idle).unwrap();
    map.apply(add_one);
    idle.run_until_idle(usize::MAX);
    assert!(image.borrow_mut().convert_drawable(d.id(), ImageType::RgbA));

    assert!(image.borrow().shadow().is_some());
    let err = map.clear().unwrap_err();
    assert_eq!(err, ImageMapError::DepthMismatch { snapshot: 1, drawable: 4 });
    assert!(!image.borrow().undo_stack().is_frozen());
    assert!(image.borrow().shadow().is_none());
    assert_eq!(
        messages.borrow().as_slice(),
        ["image depth change, unable to restore original image".to_string()]
    );
}

#[test]
fn test_abort_after_depth_change_releases_shadow() {
    let (image, d) = gradient_image(70, 20);
    let idle = IdleLoop::new();
    let mut map = ImageMap::new(d.clone(), true, &idle).unwrap();
    map.apply(add_one);
    idle.iterate();
    assert!(image.borrow_mut().convert_drawable(d.id(), ImageType::GrayA));

    map.abort();
    let img = image.borrow();
    assert!(img.shadow().is_none());
    assert!(!img.undo_stack().is_frozen());
    assert_eq!(img.undo_stack().undo_count(), 0);
    assert_eq!(idle.pending(), 0);
}

#[test]
fn test_abort_releases_shadow() {
    let (image, d) = gradient_image(16, 16);
    let idle = IdleLoop::new();
    let mut map = ImageMap::new(d, true, &idle).unwrap();
    map.apply(add_one);
    assert!(image.borrow().shadow().is_some());
    map.abort();
    assert!(image.borrow().shadow().is_none());
}

#[test]
fn test_removed_drawable_makes_map_inert() {
    let (image, d) = gradient_image(16, 16);
    let idle = IdleLoop::new();
    let mut map = ImageMap::new(d.clone(), true, &idle).unwrap();

    assert!(image.borrow_mut().remove_drawable(d.id()));
    map.apply(add_one);
    assert!(!map.is_busy());
    assert_eq!(idle.pending(), 0);
    assert_eq!(map.get_color_at(0, 0), None);

    map.commit();
    let img = image.borrow();
    assert!(!img.undo_stack().is_frozen());
    assert_eq!(img.undo_stack().undo_count(), 0);
    drop(img);

    assert_eq!(ImageMap::new(d, true, &idle).unwrap_err(), ImageMapError::ImageGone);
}

#[test]
fn test_commit_records_one_undo_step() {
    let (image, d) = gradient_image(100, 70);
    let original = pixels(&image, &d);
    let idle = IdleLoop::new();
    let mut map = ImageMap::new(d.clone(), false, &idle).unwrap();
    map.set_description("Add One");
    map.apply(add_one);
    map.commit();

    let adjusted = pixels(&image, &d);
    assert_ne!(adjusted, original);
    assert_eq!(idle.pending(), 0);
    {
        let img = image.borrow();
        assert_eq!(img.undo_stack().undo_count(), 1);
        assert_eq!(img.undo_stack().undo_description(), Some("Add One"));
    }

    assert_eq!(image.borrow_mut().undo().as_deref(), Some("Add One"));
    assert_eq!(pixels(&image, &d), original);
    assert_eq!(image.borrow_mut().redo().as_deref(), Some("Add One"));
    assert_eq!(pixels(&image, &d), adjusted);
}

#[test]
fn test_previews_are_not_recorded_while_frozen() {
    let (image, d) = gradient_image(32, 32);
    let idle = IdleLoop::new();
    let map = ImageMap::new(d.clone(), true, &idle).unwrap();

    let blocked = image
        .borrow_mut()
        .push_undo(d.id(), Rect::new(0, 0, 1, 1), paintcore::TileManager::new(1, 1, 1), "stray");
    assert!(!blocked);
    map.abort();
    assert_eq!(image.borrow().undo_stack().undo_count(), 0);
}
