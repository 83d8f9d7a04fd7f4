//! Software renderer for lander frames.
//!
//! Draws the scene into a plain RGB buffer with scanline-free triangle
//! rasterization, so headless episodes can still produce imagery. Pixel
//! space has the origin at the top-left with y pointing down; world space
//! is converted once per vertex.

use rollout::{Frame, LegState, PhysicalState};

use crate::env::{HELIPAD_Y, LEG_DOWN, SCALE, VIEWPORT_H, VIEWPORT_W, WORLD_W};

const SKY: [u8; 3] = [11, 14, 26];
const GROUND: [u8; 3] = [92, 92, 102];
const PAD: [u8; 3] = [142, 142, 152];
const FLAG_POLE: [u8; 3] = [204, 204, 204];
const FLAG: [u8; 3] = [214, 178, 38];
const HULL: [u8; 3] = [128, 106, 230];
const LEG: [u8; 3] = [98, 80, 196];
const FLAME: [u8; 3] = [255, 140, 40];

/// Hull outline in pixel units relative to the center of mass.
const HULL_POLY: [(f32, f32); 6] = [
    (-14.0, 17.0),
    (-17.0, 0.0),
    (-17.0, -10.0),
    (17.0, -10.0),
    (17.0, 0.0),
    (14.0, 17.0),
];

/// Half-width of the marked helipad strip, world meters.
const PAD_HALF_W: f32 = 2.0;
const FLAG_POLE_H: i32 = 40;

struct Canvas {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Canvas {
    fn new(width: u32, height: u32, background: [u8; 3]) -> Self {
        let mut data = vec![0; width as usize * height as usize * 3];
        for pixel in data.chunks_exact_mut(3) {
            pixel.copy_from_slice(&background);
        }
        Self {
            width,
            height,
            data,
        }
    }

    fn put(&mut self, x: i32, y: i32, color: [u8; 3]) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        if x >= self.width || y >= self.height {
            return;
        }
        let index = ((y * self.width + x) * 3) as usize;
        self.data[index..index + 3].copy_from_slice(&color);
    }

    fn fill_rect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: [u8; 3]) {
        for y in y0..y1 {
            for x in x0..x1 {
                self.put(x, y, color);
            }
        }
    }

    fn fill_triangle(&mut self, a: (f32, f32), b: (f32, f32), c: (f32, f32), color: [u8; 3]) {
        let area = edge(a, b, c);
        if area.abs() < f32::EPSILON {
            return;
        }
        let min_x = a.0.min(b.0).min(c.0).floor().max(0.0) as i32;
        let max_x = a.0.max(b.0).max(c.0).ceil().min(self.width as f32) as i32;
        let min_y = a.1.min(b.1).min(c.1).floor().max(0.0) as i32;
        let max_y = a.1.max(b.1).max(c.1).ceil().min(self.height as f32) as i32;

        for y in min_y..max_y {
            for x in min_x..max_x {
                let p = (x as f32 + 0.5, y as f32 + 0.5);
                let w0 = edge(a, b, p);
                let w1 = edge(b, c, p);
                let w2 = edge(c, a, p);
                let inside = (w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0)
                    || (w0 <= 0.0 && w1 <= 0.0 && w2 <= 0.0);
                if inside {
                    self.put(x, y, color);
                }
            }
        }
    }

    fn fill_convex(&mut self, points: &[(f32, f32)], color: [u8; 3]) {
        for i in 1..points.len().saturating_sub(1) {
            self.fill_triangle(points[0], points[i], points[i + 1], color);
        }
    }
}

fn edge(a: (f32, f32), b: (f32, f32), p: (f32, f32)) -> f32 {
    (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
}

fn to_px(x: f32, y: f32) -> (f32, f32) {
    (x * SCALE, VIEWPORT_H as f32 - y * SCALE)
}

/// Renders one frame of the current physical state. `last_action` selects
/// which engine flare to draw, if any.
#[must_use]
pub fn draw(state: &PhysicalState, last_action: usize) -> Frame {
    let mut canvas = Canvas::new(VIEWPORT_W, VIEWPORT_H, SKY);
    draw_terrain(&mut canvas);
    draw_leg(&mut canvas, &state.left_leg);
    draw_leg(&mut canvas, &state.right_leg);
    draw_hull(&mut canvas, state, last_action);
    Frame::new(VIEWPORT_W, VIEWPORT_H, canvas.data)
}

fn draw_terrain(canvas: &mut Canvas) {
    let ground_py = (VIEWPORT_H as f32 - HELIPAD_Y * SCALE) as i32;
    canvas.fill_rect(0, ground_py, VIEWPORT_W as i32, VIEWPORT_H as i32, GROUND);

    let center = WORLD_W / 2.0 * SCALE;
    let pad_x0 = (center - PAD_HALF_W * SCALE) as i32;
    let pad_x1 = (center + PAD_HALF_W * SCALE) as i32;
    canvas.fill_rect(pad_x0, ground_py - 2, pad_x1, ground_py + 3, PAD);

    for flag_x in [pad_x0, pad_x1] {
        canvas.fill_rect(flag_x, ground_py - FLAG_POLE_H, flag_x + 2, ground_py, FLAG_POLE);
        let top = (ground_py - FLAG_POLE_H) as f32;
        canvas.fill_triangle(
            (flag_x as f32, top),
            (flag_x as f32, top + 10.0),
            (flag_x as f32 + 18.0, top + 5.0),
            FLAG,
        );
    }
}

fn draw_hull(canvas: &mut Canvas, state: &PhysicalState, last_action: usize) {
    let hull = state.hull;
    let (sin, cos) = hull.angle.sin_cos();
    let transform = |p: (f32, f32)| {
        let (bx, by) = (p.0 / SCALE, p.1 / SCALE);
        let wx = hull.x + bx * cos - by * sin;
        let wy = hull.y + bx * sin + by * cos;
        to_px(wx, wy)
    };

    match last_action {
        1 => canvas.fill_triangle(
            transform((-17.0, 10.0)),
            transform((-17.0, 18.0)),
            transform((-28.0, 14.0)),
            FLAME,
        ),
        2 => canvas.fill_triangle(
            transform((-5.0, -10.0)),
            transform((5.0, -10.0)),
            transform((0.0, -26.0)),
            FLAME,
        ),
        3 => canvas.fill_triangle(
            transform((17.0, 10.0)),
            transform((17.0, 18.0)),
            transform((28.0, 14.0)),
            FLAME,
        ),
        _ => {}
    }

    let outline: Vec<(f32, f32)> = HULL_POLY.iter().map(|&p| transform(p)).collect();
    canvas.fill_convex(&outline, HULL);
}

fn draw_leg(canvas: &mut Canvas, leg: &LegState) {
    let (sin, cos) = leg.body.angle.sin_cos();
    let pivot = (leg.body.x, leg.body.y);
    let foot = (
        leg.body.x + sin * LEG_DOWN,
        leg.body.y - cos * LEG_DOWN,
    );
    // 2 px half-width strut, expanded perpendicular to the leg axis.
    let half = 2.0 / SCALE;
    let (px, py) = (cos * half, sin * half);

    let quad = [
        to_px(pivot.0 - px, pivot.1 - py),
        to_px(pivot.0 + px, pivot.1 + py),
        to_px(foot.0 + px, foot.1 + py),
        to_px(foot.0 - px, foot.1 - py),
    ];
    canvas.fill_convex(&quad, LEG);
}

#[cfg(test)]
mod tests {
    use rollout::{BodyState, LegState, PhysicalState};

    use super::*;

    fn hovering_state() -> PhysicalState {
        let hull = BodyState {
            x: WORLD_W / 2.0,
            y: 8.0,
            vx: 0.0,
            vy: 0.0,
            angle: 0.0,
            angular_velocity: 0.0,
        };
        let leg = |side: f32| LegState {
            body: BodyState {
                x: hull.x + side * 0.6667,
                y: hull.y,
                ..hull
            },
            contact: false,
        };
        PhysicalState {
            hull,
            left_leg: leg(-1.0),
            right_leg: leg(1.0),
        }
    }

    fn pixel(frame: &Frame, x: u32, y: u32) -> [u8; 3] {
        let i = ((y * frame.width + x) * 3) as usize;
        [frame.data[i], frame.data[i + 1], frame.data[i + 2]]
    }

    #[test]
    fn frame_has_viewport_dimensions() {
        let frame = draw(&hovering_state(), 0);
        assert_eq!(frame.width, VIEWPORT_W);
        assert_eq!(frame.height, VIEWPORT_H);
        assert_eq!(frame.data.len(), (VIEWPORT_W * VIEWPORT_H * 3) as usize);
    }

    #[test]
    fn sky_ground_and_hull_are_distinct() {
        let frame = draw(&hovering_state(), 0);
        // Top-left corner is sky, bottom rows are ground.
        assert_eq!(pixel(&frame, 0, 0), SKY);
        assert_eq!(pixel(&frame, 0, VIEWPORT_H - 1), GROUND);
        // The hull center sits at world (10, 8): pixel (300, 160).
        assert_eq!(pixel(&frame, 300, 160), HULL);
    }

    #[test]
    fn main_engine_flare_appears_below_the_hull() {
        let quiet = draw(&hovering_state(), 0);
        let firing = draw(&hovering_state(), 2);
        // World (10, 8) bottom of hull is pixel y = 160 + 17; the flare
        // extends further down.
        let flame_y = 160 + 20;
        assert_ne!(pixel(&quiet, 300, flame_y), FLAME);
        assert_eq!(pixel(&firing, 300, flame_y), FLAME);
    }

    #[test]
    fn helipad_flags_are_drawn() {
        let frame = draw(&hovering_state(), 0);
        let ground_py = VIEWPORT_H - (HELIPAD_Y * SCALE) as u32;
        let flag_x = (WORLD_W / 2.0 * SCALE - PAD_HALF_W * SCALE) as u32;
        assert_eq!(pixel(&frame, flag_x, ground_py - 10), FLAG_POLE);
    }
}
