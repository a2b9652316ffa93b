use crate::memory::{DISPLAY_HEIGHT, DISPLAY_STRIDE, DISPLAY_WIDTH};

/// XOR an 8-pixel-wide sprite onto a packed 1bpp framebuffer, one byte per
/// sprite row, top-left corner at `(x, y)`.
///
/// The start position wraps onto the screen; anything past the right or
/// bottom edge is clipped. Returns true if any lit pixel got switched off.
pub fn draw(framebuffer: &mut [u8], x: u8, y: u8, rows: &[u8]) -> bool {
    debug_assert_eq!(framebuffer.len(), DISPLAY_STRIDE * DISPLAY_HEIGHT);

    let x = x as usize % DISPLAY_WIDTH;
    let y = y as usize % DISPLAY_HEIGHT;
    let column = x / 8;
    let shift = x % 8;

    let mut collision = false;
    for (py, &sprite) in (y..DISPLAY_HEIGHT).zip(rows) {
        let row = py * DISPLAY_STRIDE;

        let left = sprite >> shift;
        collision |= xor_byte(&mut framebuffer[row + column], left);

        // straddles a byte boundary; the spill goes into the next byte unless
        // that's off the right edge
        if shift != 0 && column + 1 < DISPLAY_STRIDE {
            let right = sprite << (8 - shift);
            collision |= xor_byte(&mut framebuffer[row + column + 1], right);
        }
    }
    collision
}

fn xor_byte(target: &mut u8, bits: u8) -> bool {
    let erased = *target & bits != 0;
    *target ^= bits;
    erased
}

/// whether the pixel at `(x, y)` is lit
pub fn pixel(framebuffer: &[u8], x: usize, y: usize) -> bool {
    let byte = framebuffer[y * DISPLAY_STRIDE + x / 8];
    byte >> (7 - x % 8) & 1 == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::DISPLAY_SIZE;

    fn blank() -> Vec<u8> {
        vec![0; DISPLAY_SIZE]
    }

    #[test]
    fn test_aligned_draw() {
        let mut fb = blank();
        let hit = draw(&mut fb, 8, 1, &[0xa5]);
        assert!(!hit);
        assert_eq!(fb[DISPLAY_STRIDE + 1], 0xa5);
        assert_eq!(fb.iter().filter(|&&b| b != 0).count(), 1);
    }

    #[test]
    fn test_unaligned_draw_straddles_two_bytes() {
        let mut fb = blank();
        draw(&mut fb, 4, 0, &[0xff]);
        assert_eq!(&fb[..3], &[0x0f, 0xf0, 0x00]);
        for x in 0..DISPLAY_WIDTH {
            assert_eq!(pixel(&fb, x, 0), (4..12).contains(&x), "pixel {}", x);
        }
    }

    #[test]
    fn test_second_draw_restores_and_collides() {
        let mut fb = blank();
        fb[10] = 0x81;
        let before = fb.clone();
        assert!(!draw(&mut fb, 3, 1, &[0x3c, 0x00]));
        assert!(draw(&mut fb, 3, 1, &[0x3c, 0x00]));
        assert_eq!(fb, before);
    }

    #[test]
    fn test_collision_only_on_erase() {
        let mut fb = blank();
        fb[0] = 0x0f;
        // lights 0xf0 over the top, no lit pixel touched
        assert!(!draw(&mut fb, 0, 0, &[0xf0]));
        assert_eq!(fb[0], 0xff);
        assert!(draw(&mut fb, 7, 0, &[0x80]));
        assert_eq!(fb[0], 0xfe);
    }

    #[test]
    fn test_clips_right_edge() {
        let mut fb = blank();
        draw(&mut fb, 60, 0, &[0xff]);
        assert_eq!(fb[7], 0x0f);
        // nothing spilled onto the next row
        assert_eq!(fb[8], 0x00);
    }

    #[test]
    fn test_clips_bottom_edge() {
        let mut fb = blank();
        draw(&mut fb, 0, 30, &[0x80, 0x80, 0x80, 0x80]);
        assert!(pixel(&fb, 0, 30));
        assert!(pixel(&fb, 0, 31));
        assert!(!pixel(&fb, 0, 0));
        assert_eq!(fb.iter().filter(|&&b| b != 0).count(), 2);
    }

    #[test]
    fn test_start_position_wraps() {
        let mut fb = blank();
        // 70 % 64 = 6, 33 % 32 = 1
        draw(&mut fb, 70, 33, &[0xc0]);
        assert!(pixel(&fb, 6, 1));
        assert!(pixel(&fb, 7, 1));
        assert_eq!(fb[DISPLAY_STRIDE], 0x03);
    }
}
