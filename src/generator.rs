//! `make` dispatch: generators looked up by name and run in source order against the world.

use crate::context;
use crate::dump;
use crate::dictionary::Dictionary;
use crate::error::CompileError;
use crate::resolve::{MakeDirective, World};
use crate::settings::{self, Settings};
use crate::sii;
use log::{error, info, trace};
use std::fs;
use std::path::{Path, PathBuf};

/// A `make` target.
///
/// Generators read the dictionary and may publish entries into `settings`.
/// The dispatcher hands them a copy and keeps it only when they succeed.
pub trait Generator {
    fn name(&self) -> &'static str;

    fn make(
        &self,
        dictionary: &Dictionary,
        settings: &mut Settings,
        args: &[String],
        out_dir: &Path,
    ) -> Result<(), CompileError>;
}

/// `make settings;` fills fallbacks and derived keys.
pub struct SettingsGenerator;

impl Generator for SettingsGenerator {
    fn name(&self) -> &'static str {
        "settings"
    }

    fn make(&self, dictionary: &Dictionary, settings: &mut Settings, _args: &[String], _out_dir: &Path) -> Result<(), CompileError> {
        settings::derive(dictionary, settings)
    }
}

/// `make sii [path];` writes the EEPROM image (default `eeprom.bin`).
pub struct SiiGenerator;

impl Generator for SiiGenerator {
    fn name(&self) -> &'static str {
        "sii"
    }

    fn make(&self, _dictionary: &Dictionary, settings: &mut Settings, args: &[String], out_dir: &Path) -> Result<(), CompileError> {
        let image = sii::build_image(settings)?;
        trace!("SII image:\n{}", dump::hexdump(&image.bytes));
        let path = output_path(out_dir, args, "eeprom.bin");
        write_artifact(&path, &image.bytes)?;
        settings.merge(image.published);
        Ok(())
    }
}

/// `make context [path];` writes the C templating context as JSON (default `context.json`).
pub struct ContextGenerator;

impl Generator for ContextGenerator {
    fn name(&self) -> &'static str {
        "context"
    }

    fn make(&self, dictionary: &Dictionary, settings: &mut Settings, args: &[String], out_dir: &Path) -> Result<(), CompileError> {
        let json = context::build_context(dictionary, settings)?.to_json()?;
        let path = output_path(out_dir, args, "context.json");
        write_artifact(&path, json.as_bytes())
    }
}

/// First argument, or `default`, relative to `out_dir`.
fn output_path(out_dir: &Path, args: &[String], default: &str) -> PathBuf {
    out_dir.join(args.first().map(String::as_str).unwrap_or(default))
}

/// Single complete write of an output file.
fn write_artifact(path: &Path, data: &[u8]) -> Result<(), CompileError> {
    fs::write(path, data).map_err(|e| CompileError::io(path, e))?;
    info!("wrote {} ({} bytes)", path.display(), data.len());
    Ok(())
}

/// Generators by name.
pub struct Registry {
    generators: Vec<Box<dyn Generator>>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Registry::empty();
        registry.register(Box::new(SettingsGenerator));
        registry.register(Box::new(SiiGenerator));
        registry.register(Box::new(ContextGenerator));
        registry
    }
}

impl Registry {
    pub fn empty() -> Self {
        Registry { generators: Vec::new() }
    }

    /// Add a generator; a later one with the same name takes precedence.
    pub fn register(&mut self, generator: Box<dyn Generator>) {
        self.generators.insert(0, generator);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Generator> {
        self.generators.iter().find(|g| g.name() == name).map(|g| g.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.generators.iter().map(|g| g.name()).collect()
    }
}

/// A directive that failed.
#[derive(Debug)]
pub struct Failure {
    pub directive: MakeDirective,
    pub error: CompileError,
}

/// Run one directive. On failure the world's settings are left untouched.
pub fn run_one(registry: &Registry, world: &mut World, directive: &MakeDirective, out_dir: &Path) -> Result<(), CompileError> {
    let generator = registry
        .get(&directive.generator)
        .ok_or_else(|| CompileError::UnknownGenerator(directive.generator.clone()))?;
    info!("make {}({})", directive.generator, directive.args.join(","));
    let mut settings = world.settings.clone();
    generator.make(&world.dictionary, &mut settings, &directive.args, out_dir)?;
    world.settings = settings;
    Ok(())
}

/// Run every directive in order. A failure is logged and does not stop later directives.
pub fn run(registry: &Registry, world: &mut World, directives: &[MakeDirective], out_dir: &Path) -> Vec<Failure> {
    let mut failures = Vec::new();
    for directive in directives {
        if let Err(error) = run_one(registry, world, directive, out_dir) {
            error!("make {} at {}: {}", directive.generator, directive.location, error);
            failures.push(Failure {
                directive: directive.clone(),
                error,
            });
        }
    }
    failures
}
