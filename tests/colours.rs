use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub(crate) fn ball_colour() -> Rgb<u8> {
    Rgb([255, 150, 0]) // orange, same as the simulator default
}

pub(crate) fn ball_on_black(width: u32, height: u32, center: (i32, i32), radius: i32) -> RgbImage {
    let mut image = RgbImage::new(width, height);
    draw_filled_circle_mut(&mut image, center, radius, ball_colour());
    image
}

// Sprinkles dark grey pixels that stay below the default luma threshold.
pub(crate) fn dim_speckle(image: &mut RgbImage, count: usize, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for _ in 0..count {
        let x = rng.gen_range(0..image.width());
        let y = rng.gen_range(0..image.height());
        if image.get_pixel(x, y).0 == [0, 0, 0] {
            let v = rng.gen_range(1..30u8);
            image.put_pixel(x, y, Rgb([v, v, v]));
        }
    }
}
