// D3D11 compute stage: compile HLSL once, then run it over every presented frame.
//
// The back buffer cannot be read and written by one dispatch, so each frame is
// copied into a cached scratch texture (t0) and the shader writes the result
// straight into the back buffer (u0) before Present.

use anyhow::{bail, Context, Result};
use windows::core::PCSTR;
use windows::Win32::Graphics::Direct3D::Fxc::{D3DCompile, D3DCOMPILE_OPTIMIZATION_LEVEL3};
use windows::Win32::Graphics::Direct3D::ID3DBlob;
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::Common::DXGI_FORMAT;

use super::texture::{self, D3D11Texture};
use super::D3D11Device;
use crate::capture::{ContentSize, PixelFormat};
use crate::error::{CaptureError, Result as CaptureResult};
use crate::processing::FrameProcessor;

/// Thread group size matching our HLSL shaders.
const THREAD_GROUP_SIZE: u32 = 8;

/// Contents of a compiler blob.
///
/// # Safety
/// The blob must not be released while the slice is in use.
unsafe fn blob_bytes(blob: &ID3DBlob) -> &[u8] {
    std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize())
}

/// Compiled `cs_5_0` compute shader.
pub struct ComputeShader {
    shader: ID3D11ComputeShader,
}

impl ComputeShader {
    /// Compile `hlsl` and create the shader object. Compiler diagnostics become the error text.
    pub fn compile(device: &ID3D11Device, hlsl: &str, entry_point: &str) -> Result<Self> {
        let entry = format!("{entry_point}\0");
        let mut bytecode: Option<ID3DBlob> = None;
        let mut diagnostics: Option<ID3DBlob> = None;

        // SAFETY: source and the NUL-terminated entry/target strings outlive the call.
        let compiled = unsafe {
            D3DCompile(
                hlsl.as_ptr() as *const _,
                hlsl.len(),
                None,
                None,
                None,
                PCSTR(entry.as_ptr()),
                PCSTR(b"cs_5_0\0".as_ptr()),
                D3DCOMPILE_OPTIMIZATION_LEVEL3,
                0,
                &mut bytecode,
                Some(&mut diagnostics),
            )
        };
        if let Err(e) = compiled {
            let text = match &diagnostics {
                // SAFETY: diagnostics is alive for the duration of the borrow.
                Some(blob) => String::from_utf8_lossy(unsafe { blob_bytes(blob) }).into_owned(),
                None => format!("D3DCompile failed: {e}"),
            };
            bail!("{}", text.trim_end_matches('\0').trim_end());
        }
        let bytecode = bytecode.context("D3DCompile returned no bytecode")?;

        let mut shader = None;
        // SAFETY: bytecode holds a valid cs_5_0 program and is alive for the call.
        unsafe {
            device
                .CreateComputeShader(blob_bytes(&bytecode), None, Some(&mut shader))
                .context("CreateComputeShader failed")?;
        }
        Ok(Self {
            shader: shader.context("CreateComputeShader returned no shader")?,
        })
    }
}

fn create_srv(device: &ID3D11Device, texture: &ID3D11Texture2D) -> Result<ID3D11ShaderResourceView> {
    let mut srv = None;
    // SAFETY: texture was created with the shader-resource bind flag.
    unsafe { device.CreateShaderResourceView(texture, None, Some(&mut srv)) }
        .context("CreateShaderResourceView failed")?;
    srv.context("CreateShaderResourceView returned no view")
}

fn create_uav(device: &ID3D11Device, texture: &ID3D11Texture2D) -> Result<ID3D11UnorderedAccessView> {
    let mut uav = None;
    // SAFETY: back buffers are created with unordered-access usage when a processor asks for it.
    unsafe { device.CreateUnorderedAccessView(texture, None, Some(&mut uav)) }
        .context("CreateUnorderedAccessView failed")?;
    uav.context("CreateUnorderedAccessView returned no view")
}

/// Whether `format` can be the target of typed UAV stores on this device.
fn supports_typed_uav(device: &ID3D11Device, format: DXGI_FORMAT) -> bool {
    // SAFETY: capability query, no side effects.
    let support = unsafe { device.CheckFormatSupport(format) }.unwrap_or(0);
    support & D3D11_FORMAT_SUPPORT_TYPED_UNORDERED_ACCESS_VIEW.0 as u32 != 0
}

/// Scratch copy of the frame, rebuilt on size or format change.
struct Scratch {
    texture: D3D11Texture,
    srv: ID3D11ShaderResourceView,
    width: u32,
    height: u32,
    format: DXGI_FORMAT,
}

/// Frame processor running one HLSL compute shader in place on the back buffer.
///
/// The shader is compiled in `prepare()`, which the pipeline calls once at
/// construction; `process()` never compiles.
pub struct ComputeStage {
    hlsl: String,
    entry_point: String,
    shader: Option<ComputeShader>,
    scratch: Option<Scratch>,
}

impl ComputeStage {
    pub fn new(hlsl: impl Into<String>, entry_point: impl Into<String>) -> CaptureResult<Self> {
        let hlsl = hlsl.into();
        let entry_point = entry_point.into();
        if hlsl.trim().is_empty() {
            return Err(CaptureError::InvalidArgument("empty HLSL source".into()));
        }
        if entry_point.is_empty() || entry_point.contains('\0') {
            return Err(CaptureError::InvalidArgument(format!(
                "invalid shader entry point {entry_point:?}"
            )));
        }
        Ok(Self {
            hlsl,
            entry_point,
            shader: None,
            scratch: None,
        })
    }

    /// Built-in colour inversion.
    pub fn invert() -> Self {
        Self {
            hlsl: crate::shader::INVERT_HLSL.to_owned(),
            entry_point: "main".to_owned(),
            shader: None,
            scratch: None,
        }
    }

    pub fn is_compiled(&self) -> bool {
        self.shader.is_some()
    }

    /// Ensure the scratch texture + SRV exist and match the target.
    fn ensure_scratch(&mut self, device: &ID3D11Device, width: u32, height: u32, format: DXGI_FORMAT) -> Result<()> {
        if let Some(ref scratch) = self.scratch {
            if scratch.width == width && scratch.height == height && scratch.format == format {
                return Ok(());
            }
        }

        let texture = texture::create_texture(
            device,
            width,
            height,
            format,
            D3D11_BIND_SHADER_RESOURCE.0 as u32,
        )?;
        let srv = create_srv(device, &texture.0)?;
        self.scratch = Some(Scratch {
            texture,
            srv,
            width,
            height,
            format,
        });
        tracing::debug!("compute scratch texture rebuilt ({width}x{height})");
        Ok(())
    }

    fn run(&mut self, device: &D3D11Device, target: &D3D11Texture, size: ContentSize) -> CaptureResult<()> {
        let desc = target.desc();
        self.ensure_scratch(&device.device, desc.Width, desc.Height, desc.Format)?;
        let (Some(shader), Some(scratch)) = (self.shader.as_ref(), self.scratch.as_ref()) else {
            return Err(CaptureError::Shader("compute stage used before prepare()".into()));
        };
        let region = ContentSize::new(
            size.width_u32().min(desc.Width) as i32,
            size.height_u32().min(desc.Height) as i32,
        );
        scratch.apply(device, shader, target, region)?;
        Ok(())
    }
}

impl Scratch {
    /// Snapshot `target` into the scratch texture, then run `shader` over
    /// `region` reading the scratch (t0) and writing `target` (u0).
    fn apply(
        &self,
        device: &D3D11Device,
        shader: &ComputeShader,
        target: &D3D11Texture,
        region: ContentSize,
    ) -> Result<()> {
        // Per frame: ResizeBuffers fails while any view of a back buffer is alive.
        let uav = create_uav(&device.device, &target.0)?;
        let ctx = &device.context;

        // SAFETY: scratch was built from target's desc, so CopyResource sees equal
        // size and format. Views are unbound before returning so the back buffer
        // carries none into Present or ResizeBuffers.
        unsafe {
            ctx.CopyResource(&self.texture.0, &target.0);

            ctx.CSSetShader(&shader.shader, None);
            ctx.CSSetShaderResources(0, Some(&[Some(self.srv.clone())]));
            let uavs = [Some(uav)];
            ctx.CSSetUnorderedAccessViews(0, 1, Some(uavs.as_ptr()), None);
            ctx.Dispatch(
                region.width_u32().div_ceil(THREAD_GROUP_SIZE),
                region.height_u32().div_ceil(THREAD_GROUP_SIZE),
                1,
            );

            let no_srv: [Option<ID3D11ShaderResourceView>; 1] = [None];
            let no_uav: [Option<ID3D11UnorderedAccessView>; 1] = [None];
            ctx.CSSetShaderResources(0, Some(&no_srv));
            ctx.CSSetUnorderedAccessViews(0, 1, Some(no_uav.as_ptr()), None);
            ctx.CSSetShader(None, None);
        }
        Ok(())
    }
}

impl FrameProcessor<D3D11Device> for ComputeStage {
    fn prepare(&mut self, device: &D3D11Device) -> CaptureResult<()> {
        if self.shader.is_some() {
            return Ok(());
        }
        let shader = ComputeShader::compile(&device.device, &self.hlsl, &self.entry_point)
            .map_err(|e| CaptureError::Shader(format!("{e:#}")))?;
        self.shader = Some(shader);
        tracing::info!("compute shader '{}' compiled", self.entry_point);
        Ok(())
    }

    fn check_format(&self, device: &D3D11Device, format: PixelFormat) -> CaptureResult<()> {
        if supports_typed_uav(&device.device, texture::dxgi_format(format)) {
            return Ok(());
        }
        Err(CaptureError::Unsupported(format!(
            "{format} cannot be written through a typed UAV on this device"
        )))
    }

    fn needs_unordered_access(&self) -> bool {
        true
    }

    fn process(
        &mut self,
        device: &D3D11Device,
        target: &D3D11Texture,
        size: ContentSize,
        _format: PixelFormat,
    ) -> CaptureResult<()> {
        self.run(device, target, size)
    }
}
