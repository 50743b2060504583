//! Code generation and native compilation interfaces.
//!
//! Neither the kernel language nor the target toolchain is fixed here: a
//! [`CodeGenerator`] turns a [`KernelAst`] into source text, a [`Compiler`] turns
//! source text into an [`EntryPoint`]. [`KernelCache`] makes sure each distinct
//! (kernel, source, options) triple is built once per cache.

use std::fmt::Write;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use papaya::HashMap;
use tessel_ir::{EntryPoint, Kernel, ParamSpec};
use tracing::debug;

use crate::error::Result;

/// Kernel description handed to a code generator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KernelAst {
    pub name: String,
    pub params: Vec<ParamSpec>,
    /// Body in the generator's input language.
    pub body: String,
}

/// AST → source.
pub trait CodeGenerator: Send + Sync {
    fn emit(&self, kernel: &KernelAst) -> Result<String>;

    /// Backend name (e.g. "c").
    fn name(&self) -> &str;
}

/// Extra flags passed to the native compiler and linker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BuildOptions {
    pub cppargs: Vec<String>,
    pub ldargs: Vec<String>,
}

impl BuildOptions {
    pub fn include(mut self, dir: impl AsRef<str>) -> Self {
        self.cppargs.push(format!("-I{}", dir.as_ref()));
        self
    }

    pub fn link_dir(mut self, dir: impl AsRef<str>) -> Self {
        self.ldargs.push(format!("-L{}", dir.as_ref()));
        self
    }

    pub fn link(mut self, lib: impl AsRef<str>) -> Self {
        self.ldargs.push(format!("-l{}", lib.as_ref()));
        self
    }

    /// Union of two option sets, keeping first occurrences.
    pub fn merged(mut self, other: &BuildOptions) -> Self {
        for arg in &other.cppargs {
            if !self.cppargs.contains(arg) {
                self.cppargs.push(arg.clone());
            }
        }
        for arg in &other.ldargs {
            if !self.ldargs.contains(arg) {
                self.ldargs.push(arg.clone());
            }
        }
        self
    }
}

/// Source → callable entry point. Failures are fatal and never retried.
pub trait Compiler: Send + Sync {
    fn build(&self, name: &str, source: &str, options: &BuildOptions) -> Result<Arc<dyn EntryPoint>>;

    fn name(&self) -> &str;
}

/// Generator that wraps a C body into a function taking one pointer per parameter.
#[derive(Debug, Default, Clone, Copy)]
pub struct CGenerator;

impl CodeGenerator for CGenerator {
    fn emit(&self, kernel: &KernelAst) -> Result<String> {
        let params = kernel
            .params
            .iter()
            .enumerate()
            .map(|(i, param)| {
                let qualifier = if param.mutable { "" } else { "const " };
                format!("{qualifier}{}* restrict arg{i}", param.dtype.c_style())
            })
            .collect::<Vec<_>>()
            .join(", ");

        let mut source = String::new();
        let _ = writeln!(source, "static inline void {}({params}) {{", kernel.name);
        for line in kernel.body.lines() {
            let _ = writeln!(source, "  {line}");
        }
        source.push_str("}\n");
        Ok(source)
    }

    fn name(&self) -> &str {
        "c"
    }
}

type CacheKey = (String, u64);

/// Per-context cache of built kernels.
///
/// Concurrent callers with the same key may both build; the first insert wins and
/// everyone receives the same [`Kernel`].
#[derive(Default)]
pub struct KernelCache {
    kernels: HashMap<CacheKey, Kernel>,
}

impl KernelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit, build and wrap `ast`, reusing a previous build when available.
    ///
    /// # Errors
    ///
    /// Returns error if code generation or compilation fails; nothing is inserted then.
    pub fn get_or_build(
        &self,
        ast: &KernelAst,
        generator: &dyn CodeGenerator,
        compiler: &dyn Compiler,
        options: &BuildOptions,
    ) -> Result<Kernel> {
        let source = generator.emit(ast)?;
        let key = (ast.name.clone(), fingerprint(&source, compiler.name(), options));
        let guard = self.kernels.guard();

        if let Some(cached) = self.kernels.get(&key, &guard) {
            return Ok(cached.clone());
        }

        let entry = compiler.build(&ast.name, &source, options)?;
        let built = Kernel::new(ast.name.clone(), ast.params.iter().copied(), entry);
        debug!(kernel.name = %ast.name, compiler = compiler.name(), "kernel built");

        use papaya::{Compute, Operation};
        match self.kernels.compute(
            key,
            |entry| match entry {
                Some((_, existing)) => Operation::Abort(existing.clone()),
                None => Operation::Insert(built.clone()),
            },
            &guard,
        ) {
            Compute::Inserted(_, kernel) => Ok(kernel.clone()),
            Compute::Aborted(kernel) => Ok(kernel),
            _ => Ok(built),
        }
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    pub fn clear(&self) {
        self.kernels.pin().clear();
    }
}

impl std::fmt::Debug for KernelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelCache").field("kernels", &self.kernels.len()).finish()
    }
}

fn fingerprint(source: &str, compiler: &str, options: &BuildOptions) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    compiler.hash(&mut hasher);
    options.hash(&mut hasher);
    hasher.finish()
}
