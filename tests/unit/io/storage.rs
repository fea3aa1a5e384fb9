//! Tests for the training patch directory layout

#[cfg(test)]
mod tests {
    use ndarray::{Array2, Array3, s};
    use patchstitch::io::image::save_gray;
    use patchstitch::io::palette::ClassPalette;
    use patchstitch::io::storage::{PatchLayout, load_source_masks};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn square_mask(size: usize, rows: std::ops::Range<usize>) -> Array2<u8> {
        let mut mask = Array2::zeros((size, size));
        mask.slice_mut(s![rows, ..]).fill(255);
        mask
    }

    // Tests patch paths follow the numbered directory layout
    // Verified by dropping the patch number from the file name
    #[test]
    fn test_patch_paths() {
        let layout = PatchLayout::new("/data/patches");
        assert_eq!(layout.root(), Path::new("/data/patches"));
        assert_eq!(
            layout.image_patch_path("beach", 3),
            Path::new("/data/patches/beach/3/image/beach_patch_3.jpg")
        );
        assert_eq!(
            layout.label_patch_path("beach", 3, "ciel"),
            Path::new("/data/patches/beach/3/labels/ciel/beach_patch_3_labels_ciel.png")
        );
    }

    // Tests saving then listing patches numbers them from one
    // Verified by numbering patches from zero
    #[test]
    fn test_save_and_list_patches() {
        let temp_dir = TempDir::new().expect("temp dir");
        let layout = PatchLayout::new(temp_dir.path());
        let image = Array3::<u8>::from_elem((20, 30, 4), 128);

        let written = layout
            .save_image_patches("beach", image.view(), 10)
            .expect("image patches");
        assert_eq!(written, 6);

        let patches = layout.stored_patches().expect("list");
        assert_eq!(patches.len(), 6);
        let numbers: Vec<usize> = patches.iter().map(|patch| patch.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
        assert!(patches.iter().all(|patch| patch.stem == "beach"));
        assert_eq!(
            layout.cache_key(&patches[0]),
            "beach/1/image/beach_patch_1.jpg"
        );
    }

    // Tests listing skips stray files and incomplete directories
    // Verified by failing on non-numeric directories
    #[test]
    fn test_list_skips_incomplete() {
        let temp_dir = TempDir::new().expect("temp dir");
        let layout = PatchLayout::new(temp_dir.path());
        layout
            .save_image_patches("a", Array3::<u8>::zeros((8, 8, 3)).view(), 8)
            .expect("save");

        fs::create_dir_all(temp_dir.path().join("a").join("notes")).expect("dir");
        fs::create_dir_all(temp_dir.path().join("a").join("7")).expect("dir");
        fs::write(temp_dir.path().join("readme.txt"), "x").expect("file");

        let patches = layout.stored_patches().expect("list");
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].number, 1);
    }

    // Tests class maps stack mask patches with later classes winning
    // Verified by stacking masks in directory order
    #[test]
    fn test_class_map() {
        let temp_dir = TempDir::new().expect("temp dir");
        let layout = PatchLayout::new(temp_dir.path());
        let palette = ClassPalette::default();

        layout
            .save_image_patches("a", Array3::<u8>::zeros((8, 8, 3)).view(), 8)
            .expect("image");
        layout
            .save_label_patches("a", "roche", square_mask(8, 0..4).view(), 8)
            .expect("rock");
        layout
            .save_label_patches("a", "ciel", square_mask(8, 2..6).view(), 8)
            .expect("sky");
        layout
            .save_label_patches("a", "lava", square_mask(8, 0..8).view(), 8)
            .expect("unknown");

        let patches = layout.stored_patches().expect("list");
        let classes = layout.class_map(&patches[0], &palette).expect("class map");

        assert_eq!(classes.dim(), (8, 8));
        assert_eq!(classes[(1, 0)], 9);
        assert_eq!(classes[(3, 0)], 9);
        assert_eq!(classes[(5, 0)], 5);
        assert_eq!(classes[(7, 0)], 0);
    }

    // Tests a patch without labels maps to background
    // Verified by failing on a missing labels directory
    #[test]
    fn test_class_map_without_labels() {
        let temp_dir = TempDir::new().expect("temp dir");
        let layout = PatchLayout::new(temp_dir.path());
        layout
            .save_image_patches("a", Array3::<u8>::zeros((4, 4, 3)).view(), 4)
            .expect("image");

        let patches = layout.stored_patches().expect("list");
        let classes = layout
            .class_map(&patches[0], &ClassPalette::default())
            .expect("class map");
        assert!(classes.iter().all(|&class| class == 0));
    }

    // Tests source masks of one class merge by maximum
    // Verified by keeping only the last mask file
    #[test]
    fn test_load_source_masks() {
        let temp_dir = TempDir::new().expect("temp dir");
        let class_dir = temp_dir.path().join("beach").join("ciel");
        save_gray(square_mask(4, 0..1).view(), &class_dir.join("part1.png")).expect("part1");
        save_gray(square_mask(4, 3..4).view(), &class_dir.join("part2.png")).expect("part2");
        fs::write(class_dir.join("notes.txt"), "ignored").expect("notes");
        save_gray(
            square_mask(4, 0..4).view(),
            &temp_dir.path().join("beach").join("lava").join("m.png"),
        )
        .expect("unknown");

        let masks =
            load_source_masks(temp_dir.path(), "beach", &ClassPalette::default()).expect("masks");
        assert_eq!(masks.len(), 1);

        let (class, mask) = &masks[0];
        assert_eq!(class, "ciel");
        assert_eq!(mask[(0, 0)], 255);
        assert_eq!(mask[(1, 0)], 0);
        assert_eq!(mask[(3, 3)], 255);
    }

    // Tests source masks of different sizes are rejected
    // Verified by merging only the overlapping region
    #[test]
    fn test_load_source_masks_size_mismatch() {
        let temp_dir = TempDir::new().expect("temp dir");
        let class_dir = temp_dir.path().join("beach").join("eau");
        save_gray(Array2::<u8>::zeros((4, 4)).view(), &class_dir.join("a.png")).expect("a");
        save_gray(Array2::<u8>::zeros((5, 4)).view(), &class_dir.join("b.png")).expect("b");

        assert!(load_source_masks(temp_dir.path(), "beach", &ClassPalette::default()).is_err());
    }

    // Tests a photograph without masks yields nothing
    // Verified by propagating the missing directory error
    #[test]
    fn test_load_source_masks_missing() {
        let temp_dir = TempDir::new().expect("temp dir");
        let masks =
            load_source_masks(temp_dir.path(), "beach", &ClassPalette::default()).expect("empty");
        assert!(masks.is_empty());
    }
}
