// Input state tracking for keyboard and mouse wheel
// Abstracts winit events into a queryable per-frame snapshot, and turns the
// wheel into a position inside a virtual scroll region

use std::collections::HashSet;
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use super::progress::scroll_progress;

/// Pixels scrolled per wheel line.
pub const LINE_PIXELS: f32 = 60.0;

/// Pixels per second while an arrow key is held.
pub const KEY_SCROLL_SPEED: f32 = 900.0;

pub struct InputState {
    // Keyboard
    keys_held: HashSet<KeyCode>,

    // Scroll: accumulated vertical wheel lines this frame, reset in end_frame()
    pub scroll_delta: f32,

    // Window dimensions (the viewport of the scroll region)
    pub window_size: (u32, u32),
}

impl InputState {
    pub fn new() -> Self {
        Self {
            keys_held: HashSet::new(),
            scroll_delta: 0.0,
            window_size: (0, 0),
        }
    }

    /// Feed a winit WindowEvent into the input state.
    /// Call this once per event before the app's own event handling.
    pub fn process_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    match event.state {
                        ElementState::Pressed => { self.keys_held.insert(key); }
                        ElementState::Released => { self.keys_held.remove(&key); }
                    }
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / LINE_PIXELS,
                };
                self.scroll_delta += y;
            }
            WindowEvent::Resized(size) => {
                self.window_size = (size.width, size.height);
            }
            _ => {}
        }
    }

    /// Call once per frame after the scroll region has consumed input.
    /// Resets per-frame accumulators.
    pub fn end_frame(&mut self) {
        self.scroll_delta = 0.0;
    }

    pub fn is_key_held(&self, key: KeyCode) -> bool {
        self.keys_held.contains(&key)
    }

    /// Pixels to scroll this frame: wheel lines plus held arrow keys.
    /// Wheel up (positive lines) scrolls back toward the start.
    pub fn scroll_pixels(&self, dt: f32) -> f32 {
        let mut pixels = -self.scroll_delta * LINE_PIXELS;
        if self.is_key_held(KeyCode::ArrowDown) || self.is_key_held(KeyCode::PageDown) {
            pixels += KEY_SCROLL_SPEED * dt;
        }
        if self.is_key_held(KeyCode::ArrowUp) || self.is_key_held(KeyCode::PageUp) {
            pixels -= KEY_SCROLL_SPEED * dt;
        }
        pixels
    }
}

impl Default for InputState {
    fn default() -> Self { Self::new() }
}

/// A tall virtual page section whose top edge starts at the bottom of the
/// viewport. Scrolling moves it up through the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollRegion {
    /// Height of the section in pixels.
    pub height: f32,
    /// Pixels scrolled since the top entered the viewport.
    scrolled: f32,
}

impl ScrollRegion {
    pub fn new(height: f32) -> Self {
        Self { height: height.max(0.0), scrolled: 0.0 }
    }

    /// A region `screens` viewports tall, like a `400vh` page section.
    pub fn screens(screens: f32, viewport_height: f32) -> Self {
        Self::new(screens * viewport_height)
    }

    pub fn scrolled(&self) -> f32 { self.scrolled }

    /// Resize with the viewport, keeping the same progress.
    pub fn rescale(&mut self, height: f32, old_viewport: f32, new_viewport: f32) {
        let old_end = self.height + old_viewport * 0.5;
        let fraction = if old_end > 0.0 { self.scrolled / old_end } else { 0.0 };
        self.height = height.max(0.0);
        self.scrolled = fraction * (self.height + new_viewport * 0.5);
    }

    /// Scroll by `pixels`, clamped to where progress saturates.
    pub fn scroll_by(&mut self, pixels: f32, viewport_height: f32) {
        let end = self.height + viewport_height * 0.5;
        self.scrolled = (self.scrolled + pixels).clamp(0.0, end.max(0.0));
    }

    /// Top edge relative to the viewport top.
    pub fn top(&self, viewport_height: f32) -> f32 {
        viewport_height - self.scrolled
    }

    pub fn progress(&self, viewport_height: f32) -> f32 {
        scroll_progress(viewport_height, self.top(viewport_height), self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_starts_at_zero_and_saturates() {
        let mut region = ScrollRegion::new(3000.0);
        assert_eq!(region.progress(800.0), 0.0);
        region.scroll_by(1700.0, 800.0);
        assert!((region.progress(800.0) - 0.5).abs() < 1e-6);
        region.scroll_by(1e6, 800.0);
        assert_eq!(region.progress(800.0), 1.0);
        assert_eq!(region.scrolled(), 3400.0);
    }

    #[test]
    fn scrolling_back_past_the_start_clamps() {
        let mut region = ScrollRegion::new(1000.0);
        region.scroll_by(200.0, 600.0);
        region.scroll_by(-5000.0, 600.0);
        assert_eq!(region.scrolled(), 0.0);
        assert_eq!(region.progress(600.0), 0.0);
    }

    #[test]
    fn rescaling_keeps_progress() {
        let mut region = ScrollRegion::screens(4.0, 800.0);
        region.scroll_by(1234.0, 800.0);
        let before = region.progress(800.0);
        region.rescale(4.0 * 1080.0, 800.0, 1080.0);
        assert!((region.progress(1080.0) - before).abs() < 1e-5);
    }

    #[test]
    fn wheel_down_scrolls_forward() {
        let mut input = InputState::new();
        input.scroll_delta = -2.0;
        assert_eq!(input.scroll_pixels(0.016), 2.0 * LINE_PIXELS);
        input.end_frame();
        assert_eq!(input.scroll_pixels(0.016), 0.0);
    }
}
