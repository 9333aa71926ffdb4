use anyhow::{Context as AnyhowContext, Result};

/// Device and queue shared by every display.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface_format: wgpu::TextureFormat,
}

impl GpuContext {
    pub fn new_instance() -> wgpu::Instance {
        wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        })
    }

    /// Picks an adapter able to present to `surface` and negotiates the surface
    /// format every display will use.
    pub fn new(instance: wgpu::Instance, surface: &wgpu::Surface<'_>) -> Result<Self> {
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: Some(surface),
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let info = adapter.get_info();
        tracing::debug!(
            name = %info.name,
            backend = ?info.backend,
            device_type = ?info.device_type,
            "selected GPU adapter"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("toysaver device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        let caps = surface.get_capabilities(&adapter);
        let surface_format = preferred_format(&caps.formats)
            .context("surface reports no supported texture formats")?;
        tracing::debug!(?surface_format, "negotiated surface format");

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            surface_format,
        })
    }

    pub fn hdr_supported(&self) -> bool {
        is_hdr_format(self.surface_format)
    }
}

/// Shadertoy code writes gamma-encoded colours, so a non-sRGB format is
/// preferred.
pub fn preferred_format(formats: &[wgpu::TextureFormat]) -> Option<wgpu::TextureFormat> {
    formats
        .iter()
        .copied()
        .find(|format| !format.is_srgb())
        .or_else(|| {
            let fallback = formats.first().copied();
            if let Some(format) = fallback {
                tracing::warn!(?format, "no non-sRGB surface format available");
            }
            fallback
        })
}

pub fn is_hdr_format(format: wgpu::TextureFormat) -> bool {
    matches!(
        format,
        wgpu::TextureFormat::Rgba16Float | wgpu::TextureFormat::Rgb10a2Unorm
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::TextureFormat;

    #[test]
    fn prefers_non_srgb_formats() {
        let formats = [TextureFormat::Bgra8UnormSrgb, TextureFormat::Bgra8Unorm];
        assert_eq!(preferred_format(&formats), Some(TextureFormat::Bgra8Unorm));
        assert_eq!(
            preferred_format(&[TextureFormat::Bgra8UnormSrgb]),
            Some(TextureFormat::Bgra8UnormSrgb)
        );
        assert_eq!(preferred_format(&[]), None);
    }

    #[test]
    fn hdr_formats() {
        assert!(is_hdr_format(TextureFormat::Rgba16Float));
        assert!(is_hdr_format(TextureFormat::Rgb10a2Unorm));
        assert!(!is_hdr_format(TextureFormat::Bgra8Unorm));
    }
}
