//! Terminal Host Pieces
//!
//! The CLI's implementations of the host seam: a built-in preset catalog,
//! a renderer that draws a level meter to the terminal, and a fixed
//! surface standing in for a window.

use kaleido_host::{
    AnalyserHandle, FrameParams, HostError, HostResult, HostSurface, PresetBlob, PresetCatalog,
    RendererEngine, RendererFactory, SurfaceSpec,
};

/// Paints between meter lines, roughly four lines per second at 60 Hz
const METER_EVERY_FRAMES: u64 = 15;

const METER_WIDTH: usize = 50;

/// Built-in demo presets; blobs are small JSON documents the meter ignores
pub struct DemoCatalog;

const DEMO_PRESETS: [(&str, &[u8]); 3] = [
    ("bars", br#"{"style":"bars","bands":16}"#),
    ("wave", br#"{"style":"wave","mirror":true}"#),
    ("pulse", br#"{"style":"pulse","decay":0.85}"#),
];

impl PresetCatalog for DemoCatalog {
    fn keys(&self) -> Vec<String> {
        DEMO_PRESETS.iter().map(|(k, _)| (*k).to_string()).collect()
    }

    fn get(&self, key: &str) -> Option<PresetBlob> {
        DEMO_PRESETS
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, blob)| PresetBlob::new(blob.to_vec()))
    }
}

/// Renderer that reduces the spectrum to one level bar per meter line
pub struct MeterRenderer {
    analyser: Option<AnalyserHandle>,
    bins: Vec<u8>,
    preset: String,
    frames: u64,
}

impl MeterRenderer {
    fn new() -> Self {
        Self {
            analyser: None,
            bins: Vec::new(),
            preset: String::new(),
            frames: 0,
        }
    }

    fn level(&mut self) -> f32 {
        let Some(analyser) = &self.analyser else {
            return 0.0;
        };
        self.bins.resize(analyser.frequency_bin_count(), 0);
        analyser.byte_frequency_data(&mut self.bins);
        let sum: u32 = self.bins.iter().map(|&b| u32::from(b)).sum();
        sum as f32 / (self.bins.len().max(1) as f32 * 255.0)
    }
}

impl RendererEngine for MeterRenderer {
    fn load_preset(&mut self, blob: &PresetBlob, blend_secs: f32) {
        self.preset = String::from_utf8_lossy(blob.bytes())
            .chars()
            .take(40)
            .collect();
        println!("preset loaded ({blend_secs:.1}s blend): {}", self.preset);
    }

    fn render(&mut self, params: &FrameParams) {
        self.frames += 1;
        if self.frames % METER_EVERY_FRAMES != 0 {
            return;
        }
        let level = (self.level() * params.brightness).clamp(0.0, 1.0);
        let filled = (level * METER_WIDTH as f32).round() as usize;
        println!(
            "[{}{}] {:5.1}%",
            "#".repeat(filled),
            "-".repeat(METER_WIDTH - filled),
            level * 100.0
        );
    }

    fn resize(&mut self, width: u32, height: u32) {
        println!("surface resized to {width}x{height}");
    }

    fn connect_audio(&mut self, analyser: AnalyserHandle) {
        self.analyser = Some(analyser);
    }

    fn disconnect_audio(&mut self) {
        self.analyser = None;
    }
}

pub struct MeterFactory;

impl RendererFactory for MeterFactory {
    fn create(&self, surface: &SurfaceSpec) -> HostResult<Box<dyn RendererEngine>> {
        println!(
            "meter renderer on {}x{} surface (texture {})",
            surface.width, surface.height, surface.texture_size
        );
        Ok(Box::new(MeterRenderer::new()))
    }
}

/// Stand-in surface for a process without a window
pub struct TermSurface {
    width: u32,
    height: u32,
}

impl TermSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl HostSurface for TermSurface {
    fn viewport(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn request_fullscreen(&self) -> HostResult<()> {
        Err(HostError::Unsupported("no fullscreen on a terminal"))
    }

    fn exit_fullscreen(&self) -> HostResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_catalog_keys_resolve() {
        let catalog = DemoCatalog;
        for key in catalog.keys() {
            assert!(catalog.get(&key).is_some());
        }
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn test_meter_renders_without_audio() {
        let factory = MeterFactory;
        let mut renderer = factory
            .create(&SurfaceSpec {
                width: 256,
                height: 256,
                pixel_ratio: 1.0,
                texture_size: 512,
            })
            .unwrap();
        let params = FrameParams {
            gamma: 1.0,
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.0,
            hue_shift_deg: 0.0,
            invert_colors: false,
            blend_mode: kaleido_host::BlendMode::Normal,
            post_processing: true,
        };
        for _ in 0..20 {
            renderer.render(&params);
        }
    }
}
