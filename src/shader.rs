// Shader compilation
//
// Source compilation sits outside the device layer: a compiler turns GLSL or
// HLSL text into SPIR-V bytecode plus diagnostics, and only the bytecode is
// handed to `Device::create_shader`.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::{Error, ErrorKind, Result};
use crate::format::ShaderStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OptimizationLevel {
    None,
    #[default]
    Performance,
    Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SourceLanguage {
    #[default]
    Glsl,
    Hlsl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CompileOptions {
    pub optimization_level: OptimizationLevel,
    pub source_language: SourceLanguage,
    pub warnings_as_errors: bool,
}

/// Result of one compilation, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompileOutput {
    pub success: bool,
    pub binary: Vec<u8>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub infos: Vec<String>,
}

impl CompileOutput {
    /// The bytecode, or `ShaderCompileFailed` carrying the diagnostics.
    pub fn into_binary(self) -> Result<Vec<u8>> {
        for warning in &self.warnings {
            log::warn!("{}", warning);
        }

        if self.success {
            return Ok(self.binary);
        }

        let message = if self.errors.is_empty() {
            "Shader compilation failed".to_string()
        } else {
            format!("Shader compilation failed:\n{}", self.errors.join("\n"))
        };
        Err(Error::new(ErrorKind::ShaderCompileFailed, message))
    }
}

pub trait ShaderCompiler {
    /// Compile `source` for `stage`.
    ///
    /// Diagnostics come back inside the output; `Err` means the compiler
    /// itself could not run.
    fn compile(
        &self,
        source: &[u8],
        debug_name: &str,
        stage: ShaderStage,
        options: &CompileOptions,
    ) -> Result<CompileOutput>;
}

/// Runs the `glslc` tool from the Vulkan SDK.
#[derive(Debug, Clone)]
pub struct GlslcCompiler {
    executable: PathBuf,
}

impl Default for GlslcCompiler {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("glslc"),
        }
    }
}

impl GlslcCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_executable(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Command line for one compilation. Source comes from stdin, SPIR-V goes
    /// to stdout.
    pub fn arguments(stage: ShaderStage, options: &CompileOptions) -> Result<Vec<String>> {
        let stage = match stage {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Compute => "compute",
            other => {
                return Err(Error::new(
                    ErrorKind::ShaderCompileFailed,
                    format!("{other:?} is not a single compilable stage"),
                ))
            }
        };

        let mut args = vec![
            format!("-fshader-stage={stage}"),
            "-x".to_string(),
            match options.source_language {
                SourceLanguage::Glsl => "glsl",
                SourceLanguage::Hlsl => "hlsl",
            }
            .to_string(),
            match options.optimization_level {
                OptimizationLevel::None => "-O0",
                OptimizationLevel::Performance => "-O",
                OptimizationLevel::Size => "-Os",
            }
            .to_string(),
        ];
        if options.warnings_as_errors {
            args.push("-Werror".to_string());
        }
        args.extend(["-o".to_string(), "-".to_string(), "-".to_string()]);
        Ok(args)
    }
}

impl ShaderCompiler for GlslcCompiler {
    fn compile(
        &self,
        source: &[u8],
        debug_name: &str,
        stage: ShaderStage,
        options: &CompileOptions,
    ) -> Result<CompileOutput> {
        let args = Self::arguments(stage, options)?;
        log::debug!("Compiling {} with {:?} {:?}", debug_name, self.executable, args);

        let spawn_error = |e: std::io::Error| {
            Error::new(
                ErrorKind::ShaderCompileFailed,
                format!("Failed to run {:?} for {}: {}", self.executable, debug_name, e),
            )
        };

        let mut child = Command::new(&self.executable)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(source).map_err(spawn_error)?;
        }
        let output = child.wait_with_output().map_err(spawn_error)?;

        let mut result = parse_diagnostics(&String::from_utf8_lossy(&output.stderr), debug_name);
        result.success = output.status.success();
        if result.success {
            result.binary = output.stdout;
        }
        Ok(result)
    }
}

/// Sort compiler diagnostics into errors, warnings and infos, naming the
/// source by `debug_name` instead of stdin.
fn parse_diagnostics(stderr: &str, debug_name: &str) -> CompileOutput {
    let mut output = CompileOutput::default();

    for line in stderr.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let line = line.replace("<stdin>", debug_name);
        if line.contains("error:") {
            output.errors.push(line);
        } else if line.contains("warning:") {
            output.warnings.push(line);
        } else {
            output.infos.push(line);
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_follow_options() {
        let args = GlslcCompiler::arguments(ShaderStage::Fragment, &CompileOptions::default()).unwrap();
        assert_eq!(args, ["-fshader-stage=fragment", "-x", "glsl", "-O", "-o", "-", "-"]);

        let options = CompileOptions {
            optimization_level: OptimizationLevel::Size,
            source_language: SourceLanguage::Hlsl,
            warnings_as_errors: true,
        };
        let args = GlslcCompiler::arguments(ShaderStage::Vertex, &options).unwrap();
        assert!(args.contains(&"-Os".to_string()));
        assert!(args.contains(&"hlsl".to_string()));
        assert!(args.contains(&"-Werror".to_string()));
    }

    #[test]
    fn combined_stages_are_rejected() {
        let err = GlslcCompiler::arguments(ShaderStage::AllGraphics, &CompileOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShaderCompileFailed);
    }

    #[test]
    fn diagnostics_are_sorted() {
        let stderr = "<stdin>:3: error: 'foo' : undeclared identifier\n\
                      <stdin>:1: warning: version 450 is newer\n\
                      1 error generated.\n";
        let output = parse_diagnostics(stderr, "triangle.vert");
        assert_eq!(output.errors, ["triangle.vert:3: error: 'foo' : undeclared identifier"]);
        assert_eq!(output.warnings.len(), 1);
        assert_eq!(output.infos, ["1 error generated."]);
    }

    #[test]
    fn failed_output_becomes_error() {
        let output = CompileOutput {
            success: false,
            errors: vec!["boom".to_string()],
            ..CompileOutput::default()
        };
        let err = output.into_binary().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShaderCompileFailed);
        assert!(err.message().contains("boom"));

        let output = CompileOutput {
            success: true,
            binary: vec![1, 2, 3, 4],
            ..CompileOutput::default()
        };
        assert_eq!(output.into_binary().unwrap(), vec![1, 2, 3, 4]);
    }
}
