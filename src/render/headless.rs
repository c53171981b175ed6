//! A software [`GpuContext`] with no GPU behind it.
//!
//! Compilation is structural only: a `#version` directive first, balanced
//! brackets and a `main` entry point. Linking checks that every fragment input
//! has a vertex output of the same name and type. Logs follow the driver
//! convention of `0:<line>: error: <message>`.
//!
//! Bound-program state is kept per instance, so several contexts can be used
//! side by side.

use std::cell::RefCell;
use std::collections::HashMap;
use std::num::NonZeroU32;

use log::{debug, warn};

use super::context::{GpuContext, ProgramHandle, ShaderHandle, ShaderStage, UniformLocation};

#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    F32(f32),
    Vec4([f32; 4]),
    Mat4([f32; 16]),
}

struct ShaderObject {
    stage: ShaderStage,
    source: String,
    compiled: bool,
    log: String,
}

#[derive(Default)]
struct ProgramObject {
    attached: Vec<ShaderHandle>,
    linked: bool,
    log: String,
    uniforms: Vec<String>,
}

#[derive(Default)]
struct State {
    next_id: u32,
    shaders: HashMap<ShaderHandle, ShaderObject>,
    programs: HashMap<ProgramHandle, ProgramObject>,
    current: Option<ProgramHandle>,
    bind_calls: usize,
    uploads: Vec<(UniformLocation, UniformValue)>,
}

impl State {
    fn allocate(&mut self) -> Result<NonZeroU32, String> {
        self.next_id += 1;
        NonZeroU32::new(self.next_id).ok_or_else(|| "object names exhausted".to_string())
    }
}

#[derive(Default)]
pub struct HeadlessContext {
    state: RefCell<State>,
}

impl HeadlessContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `use_program` calls that reached the context.
    pub fn bind_calls(&self) -> usize {
        self.state.borrow().bind_calls
    }

    pub fn live_shaders(&self) -> usize {
        self.state.borrow().shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    pub fn uniform_uploads(&self) -> Vec<(UniformLocation, UniformValue)> {
        self.state.borrow().uploads.clone()
    }

    fn record_upload(&self, location: UniformLocation, value: UniformValue) {
        let mut state = self.state.borrow_mut();
        if state.current.is_none() {
            warn!("uniform upload with no program bound");
            return;
        }
        state.uploads.push((location, value));
    }
}

impl GpuContext for HeadlessContext {
    fn create_shader(&self, stage: ShaderStage) -> Result<ShaderHandle, String> {
        let mut state = self.state.borrow_mut();
        let handle = ShaderHandle(state.allocate()?);
        state.shaders.insert(
            handle,
            ShaderObject {
                stage,
                source: String::new(),
                compiled: false,
                log: String::new(),
            },
        );
        Ok(handle)
    }

    fn shader_source(&self, shader: ShaderHandle, source: &str) {
        if let Some(object) = self.state.borrow_mut().shaders.get_mut(&shader) {
            object.source = source.to_string();
        }
    }

    fn compile_shader(&self, shader: ShaderHandle) {
        if let Some(object) = self.state.borrow_mut().shaders.get_mut(&shader) {
            match check_stage(&object.source) {
                Ok(()) => {
                    object.compiled = true;
                    object.log.clear();
                }
                Err(log) => {
                    object.compiled = false;
                    object.log = log;
                }
            }
            debug!("headless compile of {} stage: {}", object.stage, object.compiled);
        }
    }

    fn shader_compile_status(&self, shader: ShaderHandle) -> bool {
        self.state
            .borrow()
            .shaders
            .get(&shader)
            .is_some_and(|object| object.compiled)
    }

    fn shader_info_log(&self, shader: ShaderHandle) -> String {
        self.state
            .borrow()
            .shaders
            .get(&shader)
            .map(|object| object.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&self, shader: ShaderHandle) {
        self.state.borrow_mut().shaders.remove(&shader);
    }

    fn create_program(&self) -> Result<ProgramHandle, String> {
        let mut state = self.state.borrow_mut();
        let handle = ProgramHandle(state.allocate()?);
        state.programs.insert(handle, ProgramObject::default());
        Ok(handle)
    }

    fn attach_shader(&self, program: ProgramHandle, shader: ShaderHandle) {
        if let Some(object) = self.state.borrow_mut().programs.get_mut(&program) {
            if !object.attached.contains(&shader) {
                object.attached.push(shader);
            }
        }
    }

    fn detach_shader(&self, program: ProgramHandle, shader: ShaderHandle) {
        if let Some(object) = self.state.borrow_mut().programs.get_mut(&program) {
            object.attached.retain(|attached| *attached != shader);
        }
    }

    fn link_program(&self, program: ProgramHandle) {
        let mut state = self.state.borrow_mut();
        let State {
            shaders, programs, ..
        } = &mut *state;
        let Some(object) = programs.get_mut(&program) else {
            return;
        };

        let result = link_stages(&object.attached, shaders);
        match result {
            Ok(uniforms) => {
                object.linked = true;
                object.log.clear();
                object.uniforms = uniforms;
            }
            Err(log) => {
                object.linked = false;
                object.log = log;
                object.uniforms.clear();
            }
        }
    }

    fn program_link_status(&self, program: ProgramHandle) -> bool {
        self.state
            .borrow()
            .programs
            .get(&program)
            .is_some_and(|object| object.linked)
    }

    fn program_info_log(&self, program: ProgramHandle) -> String {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|object| object.log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&self, program: ProgramHandle) {
        let mut state = self.state.borrow_mut();
        state.programs.remove(&program);
        if state.current == Some(program) {
            state.current = None;
        }
    }

    fn use_program(&self, program: Option<ProgramHandle>) {
        let mut state = self.state.borrow_mut();
        state.bind_calls += 1;
        if let Some(handle) = program {
            if !state.programs.get(&handle).is_some_and(|object| object.linked) {
                warn!("use_program on unlinked program {}", handle.raw());
                return;
            }
        }
        state.current = program;
    }

    fn current_program(&self) -> Option<ProgramHandle> {
        self.state.borrow().current
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let state = self.state.borrow();
        let object = state.programs.get(&program).filter(|object| object.linked)?;
        object
            .uniforms
            .iter()
            .position(|uniform| uniform == name)
            .and_then(|index| u32::try_from(index).ok())
            .map(UniformLocation)
    }

    fn uniform_f32(&self, location: UniformLocation, value: f32) {
        self.record_upload(location, UniformValue::F32(value));
    }

    fn uniform_vec4(&self, location: UniformLocation, value: [f32; 4]) {
        self.record_upload(location, UniformValue::Vec4(value));
    }

    fn uniform_mat4(&self, location: UniformLocation, value: &[f32; 16]) {
        self.record_upload(location, UniformValue::Mat4(*value));
    }
}

fn check_stage(source: &str) -> Result<(), String> {
    let code = strip_comments(source);
    let first = code
        .lines()
        .enumerate()
        .find(|(_, line)| !line.trim().is_empty());
    match first {
        Some((_, line)) if line.trim_start().starts_with("#version") => {}
        Some((index, _)) => {
            return Err(format!(
                "0:{}: error: #version directive must come first",
                index + 1
            ))
        }
        None => return Err("0:0: error: empty shader source".to_string()),
    }

    let mut open: Vec<(char, usize)> = Vec::new();
    for (index, line) in code.lines().enumerate() {
        for c in line.chars() {
            match c {
                '{' | '(' | '[' => open.push((c, index + 1)),
                '}' | ')' | ']' => {
                    let expected = match c {
                        '}' => '{',
                        ')' => '(',
                        _ => '[',
                    };
                    match open.pop() {
                        Some((opened, _)) if opened == expected => {}
                        _ => {
                            return Err(format!(
                                "0:{}: error: syntax error, unexpected '{c}'",
                                index + 1
                            ))
                        }
                    }
                }
                _ => {}
            }
        }
    }
    if let Some((c, line)) = open.pop() {
        return Err(format!("0:{line}: error: syntax error, unmatched '{c}'"));
    }

    let has_main = code.lines().any(|line| {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        tokens
            .windows(2)
            .any(|pair| pair[0] == "void" && pair[1].starts_with("main("))
            || tokens.windows(3).any(|t| t[0] == "void" && t[1] == "main" && t[2].starts_with('('))
    });
    if !has_main {
        return Err("0:0: error: no function with name 'main' defined".to_string());
    }
    Ok(())
}

/// Links the attached stages, returning the uniforms the program declares.
fn link_stages(
    attached: &[ShaderHandle],
    shaders: &HashMap<ShaderHandle, ShaderObject>,
) -> Result<Vec<String>, String> {
    let mut sources: HashMap<ShaderStage, &ShaderObject> = HashMap::new();
    for handle in attached {
        let Some(object) = shaders.get(handle) else {
            return Err(format!("error: shader {} was deleted", handle.0));
        };
        if !object.compiled {
            return Err(format!("error: {} shader is not compiled", object.stage));
        }
        sources.insert(object.stage, object);
    }
    for stage in ShaderStage::ALL {
        if !sources.contains_key(&stage) {
            return Err(format!("error: no {stage} shader attached"));
        }
    }

    let outputs: HashMap<String, String> = declarations(&sources[&ShaderStage::Vertex].source, "out")
        .into_iter()
        .map(|(ty, name)| (name, ty))
        .collect();
    let mut errors = Vec::new();
    for (ty, name) in declarations(&sources[&ShaderStage::Fragment].source, "in") {
        match outputs.get(&name) {
            None => errors.push(format!(
                "error: fragment shader input `{name}` has no matching vertex shader output"
            )),
            Some(vertex_ty) if *vertex_ty != ty => errors.push(format!(
                "error: `{name}` declared as {vertex_ty} in vertex shader and {ty} in fragment shader"
            )),
            Some(_) => {}
        }
    }
    if !errors.is_empty() {
        return Err(errors.join("\n"));
    }

    let mut uniforms = Vec::new();
    for stage in ShaderStage::ALL {
        for (_, name) in declarations(&sources[&stage].source, "uniform") {
            if !uniforms.contains(&name) {
                uniforms.push(name);
            }
        }
    }
    Ok(uniforms)
}

/// Global `<qualifier> <type> <name>;` declarations as `(type, name)` pairs.
fn declarations(source: &str, qualifier: &str) -> Vec<(String, String)> {
    const INTERPOLATION: [&str; 3] = ["flat", "smooth", "noperspective"];

    strip_comments(source)
        .lines()
        .filter_map(|line| {
            let mut line = line.trim();
            if line.starts_with("layout") {
                line = line.split_once(')')?.1.trim_start();
            }
            let mut tokens = line
                .split_whitespace()
                .skip_while(|token| INTERPOLATION.contains(token));
            if tokens.next()? != qualifier {
                return None;
            }
            let ty = tokens.next()?;
            let name = tokens.next()?.trim_end_matches(';');
            let name = name.split('[').next().unwrap_or(name);
            Some((ty.to_string(), name.to_string()))
        })
        .collect()
}

/// Blanks out `//` and `/* */` comments, keeping newlines so line numbers
/// still match the original source.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut in_line = false;
    let mut in_block = false;

    while let Some(c) = chars.next() {
        if in_line {
            if c == '\n' {
                in_line = false;
                out.push(c);
            } else {
                out.push(' ');
            }
        } else if in_block {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                in_block = false;
                out.push_str("  ");
            } else if c == '\n' {
                out.push(c);
            } else {
                out.push(' ');
            }
        } else if c == '/' && chars.peek() == Some(&'/') {
            chars.next();
            in_line = true;
            out.push_str("  ");
        } else if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            in_block = true;
            out.push_str("  ");
        } else {
            out.push(c);
        }
    }
    out
}
