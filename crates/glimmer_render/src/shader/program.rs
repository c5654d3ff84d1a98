//! Linked shader program with memoized location lookups.

use std::collections::HashMap;

use tracing::{debug, error, warn};

use crate::backend::{GraphicsDevice, RawId, ShaderStage, UniformLocation, UniformValue};
use crate::error::{RenderError, RenderResult};
use crate::resource::ProgramHandle;

/// Source lines shown when a compile log names no line.
const FALLBACK_CONTEXT_LINES: usize = 20;

/// A compiled and linked vertex + fragment program.
///
/// Creation never fails outright. A compile or link error is logged with the
/// driver diagnostic and the offending source lines, and the program is left
/// invalid: [`raw`](Self::raw) is `0` and every other call is a no-op.
///
/// Uniform and attribute locations are looked up once per name and cached,
/// including misses, so a missing uniform is reported once rather than every
/// frame.
#[derive(Debug)]
pub struct ShaderProgram {
    program: Option<ProgramHandle>,
    uniforms: HashMap<String, Option<UniformLocation>>,
    attributes: HashMap<String, Option<u32>>,
}

impl ShaderProgram {
    /// Compiles and links `vertex` and `fragment` sources.
    pub fn new<D: GraphicsDevice + ?Sized>(device: &mut D, vertex: &str, fragment: &str) -> Self {
        let program = match link(device, vertex, fragment) {
            Ok(id) => {
                debug!("shader program {} created", id);
                Some(ProgramHandle::from_raw(id))
            }
            Err(err) => {
                report(&err, vertex, fragment);
                None
            }
        };
        Self {
            program,
            uniforms: HashMap::new(),
            attributes: HashMap::new(),
        }
    }

    /// Whether the program linked and has not been disposed.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.id().is_some()
    }

    /// Raw program id, `0` when invalid or disposed.
    #[inline]
    #[must_use]
    pub fn raw(&self) -> u32 {
        self.program.as_ref().map_or(0, ProgramHandle::raw)
    }

    fn id(&self) -> Option<RawId> {
        self.program.as_ref().and_then(ProgramHandle::id)
    }

    /// Makes this the current program. No-op when invalid.
    pub fn use_program<D: GraphicsDevice + ?Sized>(&self, device: &mut D) {
        if let Some(id) = self.id() {
            device.use_program(Some(id));
        }
    }

    /// Location of uniform `name`, queried once and cached.
    pub fn uniform_location<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        name: &str,
    ) -> Option<UniformLocation> {
        let id = self.id()?;
        if let Some(&cached) = self.uniforms.get(name) {
            return cached;
        }
        let location = device.uniform_location(id, name);
        if location.is_none() {
            warn!("uniform not found: {}", name);
        }
        self.uniforms.insert(name.to_owned(), location);
        location
    }

    /// Location of vertex attribute `name`, queried once and cached.
    pub fn attribute_location<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        name: &str,
    ) -> Option<u32> {
        let id = self.id()?;
        if let Some(&cached) = self.attributes.get(name) {
            return cached;
        }
        let location = device.attribute_location(id, name);
        if location.is_none() {
            warn!("attribute not found: {}", name);
        }
        self.attributes.insert(name.to_owned(), location);
        location
    }

    /// Writes uniform `name` of this program, which must be in use.
    ///
    /// Accepts `f32`, `i32`, `[f32; 2]`, `[f32; 3]`, `[f32; 4]` and
    /// `[f32; 16]` (column-major). No-op when the program is invalid or has
    /// no such uniform.
    pub fn set_uniform<D, V>(&mut self, device: &mut D, name: &str, value: V)
    where
        D: GraphicsDevice + ?Sized,
        V: Into<UniformValue>,
    {
        if let Some(location) = self.uniform_location(device, name) {
            device.set_uniform(location, value.into());
        }
    }

    /// Deletes the program and clears both caches. Safe to call repeatedly.
    pub fn dispose<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) {
        if let Some(program) = self.program.as_mut() {
            program.release(device);
        }
        self.uniforms.clear();
        self.attributes.clear();
    }
}

/// Compiles both stages and links them. Stage objects are always deleted.
fn link<D: GraphicsDevice + ?Sized>(
    device: &mut D,
    vertex: &str,
    fragment: &str,
) -> RenderResult<RawId> {
    let vs = device.compile_shader(ShaderStage::Vertex, vertex)?;
    let fs = match device.compile_shader(ShaderStage::Fragment, fragment) {
        Ok(fs) => fs,
        Err(err) => {
            device.delete_shader(vs);
            return Err(err);
        }
    };
    let linked = device.link_program(vs, fs);
    device.delete_shader(vs);
    device.delete_shader(fs);
    linked
}

fn report(err: &RenderError, vertex: &str, fragment: &str) {
    error!("{}", err);
    if let RenderError::ShaderCompile { stage, log } = err {
        let source = match stage {
            ShaderStage::Vertex => vertex,
            ShaderStage::Fragment => fragment,
        };
        for (number, line) in offending_lines(log, source) {
            error!("{:4}: {}", number, line);
        }
    }
}

/// Source lines a compile log refers to, as `(1-based number, text)`.
///
/// Understands `N:12:` (Mesa, ANGLE, Adreno) and `N(12)` (NVIDIA), where `N`
/// is the source-string index. Falls back to the head of the source when the
/// log names no line.
pub(crate) fn offending_lines<'s>(log: &str, source: &'s str) -> Vec<(usize, &'s str)> {
    let lines: Vec<&str> = source.lines().collect();
    let mut numbers: Vec<usize> = log.lines().filter_map(line_number).collect();
    numbers.sort_unstable();
    numbers.dedup();
    numbers.retain(|n| (1..=lines.len()).contains(n));

    if numbers.is_empty() {
        return lines
            .iter()
            .take(FALLBACK_CONTEXT_LINES)
            .enumerate()
            .map(|(i, line)| (i + 1, *line))
            .collect();
    }
    numbers.into_iter().map(|n| (n, lines[n - 1])).collect()
}

/// Line number from the first `<string>:<line>` or `<string>(<line>)` marker.
fn line_number(log_line: &str) -> Option<usize> {
    let bytes = log_line.as_bytes();
    let mut at = 0;
    while at < bytes.len() {
        if !bytes[at].is_ascii_digit() {
            at += 1;
            continue;
        }
        let string_end = at + digit_run(&bytes[at..]);
        // A source-string index starts a token: `C0000:` is an error code.
        let starts_token = at == 0 || !bytes[at - 1].is_ascii_alphanumeric();
        if starts_token && matches!(bytes.get(string_end), Some(b':' | b'(')) {
            let line_start = string_end + 1;
            let line_end = line_start + digit_run(&bytes[line_start..]);
            if line_end > line_start {
                return log_line[line_start..line_end].parse().ok();
            }
        }
        at = string_end;
    }
    None
}

fn digit_run(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}
