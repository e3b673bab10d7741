/// Integer luminance with weights 11/16/5 (out of 32) for red, green and blue.
pub fn to_gray(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 11 + g as u32 * 16 + b as u32 * 5) / 32) as u8
}

/// Ink density of a pixel: black is 1, white is 0.
pub fn to_density(r: u8, g: u8, b: u8) -> f32 {
    gray_to_density(to_gray(r, g, b))
}

pub fn gray_to_density(gray: u8) -> f32 {
    1.0 - gray as f32 / 255.0
}
