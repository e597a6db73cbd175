use shared::domain::Slide;

/// Size of the canvas slide elements are authored against.
pub const DESIGN_WIDTH: u32 = 1920;
pub const DESIGN_HEIGHT: u32 = 1080;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn design() -> Self {
        Self::new(DESIGN_WIDTH, DESIGN_HEIGHT)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::design()
    }
}

/// Largest scale at which the design canvas fits inside `viewport` without cropping.
pub fn fit_scale(viewport: Viewport) -> f32 {
    if viewport.width == 0 || viewport.height == 0 {
        return 0.0;
    }
    let horizontal = viewport.width as f32 / DESIGN_WIDTH as f32;
    let vertical = viewport.height as f32 / DESIGN_HEIGHT as f32;
    horizontal.min(vertical)
}

/// External slide renderer. Surfaces only hand it the slide and their own scale.
pub trait SlideRenderer {
    type Frame;

    fn render(&self, slide: &Slide, scale: f32) -> Self::Frame;
}

/// Renders a one-line textual outline of a slide; used by headless surfaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutlineRenderer;

impl SlideRenderer for OutlineRenderer {
    type Frame = String;

    fn render(&self, slide: &Slide, scale: f32) -> String {
        let texts: Vec<&str> = slide
            .elements
            .iter()
            .filter_map(|element| element.get("text").and_then(|text| text.as_str()))
            .collect();
        format!(
            "slide {} @{:.2}x [{}] {}",
            slide.id,
            scale,
            slide.background,
            texts.join(" / ")
        )
    }
}

#[cfg(test)]
#[path = "tests/renderer_tests.rs"]
mod tests;
