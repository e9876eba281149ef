//! Text style state and the bounded style stack

use stipple_paint::Color;

use crate::registry::FontId;
use crate::{Result, TextError};

/// Maximum depth of a [`StyleStack`]
pub const MAX_STYLE_STATES: usize = 20;

/// Horizontal alignment relative to the pen origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Vertical alignment relative to the pen origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VAlign {
    Top,
    Middle,
    #[default]
    Baseline,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextAlign {
    pub horizontal: HAlign,
    pub vertical: VAlign,
}

impl TextAlign {
    pub const fn new(horizontal: HAlign, vertical: VAlign) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }
}

/// One entry of the style stack
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    /// Active font, `None` until one is selected
    pub font: Option<FontId>,
    /// Pixel size
    pub size: f32,
    pub color: Color,
    /// Blur radius in pixels
    pub blur: f32,
    /// Extra space between glyphs in pixels
    pub spacing: f32,
    pub align: TextAlign,
    /// Line height as a multiple of the font's own line height
    pub line_height: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font: None,
            size: 12.0,
            color: Color::WHITE,
            blur: 0.0,
            spacing: 0.0,
            align: TextAlign::default(),
            line_height: 1.0,
        }
    }
}

impl TextStyle {
    pub fn with_font(mut self, font: FontId) -> Self {
        self.font = Some(font);
        self
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_blur(mut self, blur: f32) -> Self {
        self.blur = blur;
        self
    }

    pub fn with_spacing(mut self, spacing: f32) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_align(mut self, align: TextAlign) -> Self {
        self.align = align;
        self
    }
}

/// Fixed-depth stack of text styles; never empty
#[derive(Debug, Clone)]
pub struct StyleStack {
    states: Vec<TextStyle>,
}

impl Default for StyleStack {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleStack {
    pub fn new() -> Self {
        let mut states = Vec::with_capacity(MAX_STYLE_STATES);
        states.push(TextStyle::default());
        Self { states }
    }

    pub fn depth(&self) -> usize {
        self.states.len()
    }

    pub fn current(&self) -> &TextStyle {
        // the bottom entry is never popped
        &self.states[self.states.len() - 1]
    }

    pub fn current_mut(&mut self) -> &mut TextStyle {
        let top = self.states.len() - 1;
        &mut self.states[top]
    }

    /// Duplicate the current state
    pub fn push(&mut self) -> Result<()> {
        if self.states.len() >= MAX_STYLE_STATES {
            tracing::warn!(depth = self.states.len(), "text style stack overflow");
            return Err(TextError::StyleStackOverflow);
        }
        let top = *self.current();
        self.states.push(top);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<()> {
        if self.states.len() <= 1 {
            tracing::warn!("text style stack underflow");
            return Err(TextError::StyleStackUnderflow);
        }
        self.states.pop();
        Ok(())
    }

    /// Reset the current state to defaults, keeping the depth
    pub fn clear_state(&mut self) {
        *self.current_mut() = TextStyle::default();
    }

    /// Drop every pushed state and reset the remaining one
    pub fn reset(&mut self) {
        self.states.truncate(1);
        self.clear_state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_duplicates_and_pop_restores() {
        let mut stack = StyleStack::new();
        stack.current_mut().size = 18.0;
        stack.push().unwrap();
        assert_eq!(stack.current().size, 18.0);
        stack.current_mut().size = 30.0;
        stack.current_mut().align = TextAlign::new(HAlign::Center, VAlign::Middle);
        stack.pop().unwrap();
        assert_eq!(stack.current().size, 18.0);
        assert_eq!(stack.current().align, TextAlign::default());
    }

    #[test]
    fn test_overflow_is_reported_and_harmless() {
        let mut stack = StyleStack::new();
        for _ in 1..MAX_STYLE_STATES {
            stack.push().unwrap();
        }
        assert_eq!(stack.push(), Err(TextError::StyleStackOverflow));
        assert_eq!(stack.depth(), MAX_STYLE_STATES);
    }

    #[test]
    fn test_underflow_is_reported_and_harmless() {
        let mut stack = StyleStack::new();
        stack.current_mut().blur = 2.0;
        assert_eq!(stack.pop(), Err(TextError::StyleStackUnderflow));
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.current().blur, 2.0);
    }

    #[test]
    fn test_reset_and_clear_state() {
        let mut stack = StyleStack::new();
        stack.push().unwrap();
        stack.push().unwrap();
        stack.current_mut().spacing = 4.0;
        stack.clear_state();
        assert_eq!(stack.depth(), 3);
        assert_eq!(*stack.current(), TextStyle::default());
        stack.current_mut().size = 40.0;
        stack.reset();
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.current().size, 12.0);
    }
}
