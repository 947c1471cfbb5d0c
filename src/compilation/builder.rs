use crate::{
    compilation::{
        compiler::CompilePass, CodeGenerator, CompilationOptions, CompilationResults,
        ListingCodeGenerator, NameMangler,
    },
    dependency::CancellationToken,
    il::MethodBodyProvider,
    scanner::{CompilationRoot, IlScanner, RootProvider, ScanResults},
    typesystem::TypeSystemContext,
    Error, Result,
};

static DEFAULT_GENERATOR: ListingCodeGenerator = ListingCodeGenerator;

/// Configures a [`Compilation`].
///
/// Method bodies and roots are required; options default to
/// [`CompilationOptions::default`] and the code generator to [`ListingCodeGenerator`].
///
/// # Examples
///
/// ```rust
/// use dotaot::prelude::*;
///
/// let context = TypeSystemContext::new();
/// let program = TypeBuilder::new(&context, "App", "Program").build()?;
/// let main = MethodBuilder::new(&context, program, "Main").static_method().build()?;
///
/// let bodies = InMemoryMethodBodyProvider::new();
/// bodies.insert(main, MethodBody::new(vec![Instruction::Ret]));
/// let roots = VecRootProvider::from(vec![CompilationRoot::method(main, "entry point")]);
///
/// let compilation = CompilationBuilder::new(&context)
///     .method_bodies(&bodies)
///     .roots(&roots)
///     .options(CompilationOptions::single_threaded())
///     .build()?;
/// let results = compilation.run()?;
/// assert_eq!(results.methods().len(), 1);
/// # Ok::<(), dotaot::Error>(())
/// ```
pub struct CompilationBuilder<'a> {
    context: &'a TypeSystemContext,
    bodies: Option<&'a dyn MethodBodyProvider>,
    roots: Option<&'a dyn RootProvider>,
    options: CompilationOptions,
    generator: &'a dyn CodeGenerator,
    cancellation: Option<CancellationToken>,
    mangler: NameMangler,
}

impl<'a> CompilationBuilder<'a> {
    /// Starts configuring a compilation over `context`.
    #[must_use]
    pub fn new(context: &'a TypeSystemContext) -> Self {
        CompilationBuilder {
            context,
            bodies: None,
            roots: None,
            options: CompilationOptions::default(),
            generator: &DEFAULT_GENERATOR,
            cancellation: None,
            mangler: NameMangler::default(),
        }
    }

    /// Sets the source of method bodies.
    #[must_use]
    pub fn method_bodies(mut self, bodies: &'a dyn MethodBodyProvider) -> Self {
        self.bodies = Some(bodies);
        self
    }

    /// Sets the source of roots.
    #[must_use]
    pub fn roots(mut self, roots: &'a dyn RootProvider) -> Self {
        self.roots = Some(roots);
        self
    }

    /// Sets the options.
    #[must_use]
    pub fn options(mut self, options: CompilationOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the backend.
    #[must_use]
    pub fn code_generator(mut self, generator: &'a dyn CodeGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Makes every pass observe `token`.
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Sets the symbol naming scheme.
    #[must_use]
    pub fn name_mangler(mut self, mangler: NameMangler) -> Self {
        self.mangler = mangler;
        self
    }

    /// Collects the roots and returns the configured compilation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Error`] if method bodies or roots were not set, and propagates
    /// errors of the root provider.
    pub fn build(self) -> Result<Compilation<'a>> {
        let bodies = self
            .bodies
            .ok_or_else(|| Error::Error("no method body provider configured".to_string()))?;
        let provider = self
            .roots
            .ok_or_else(|| Error::Error("no root provider configured".to_string()))?;
        let roots = provider.roots(self.context)?;
        log::debug!("compilation configured with {} roots", roots.len());

        Ok(Compilation {
            context: self.context,
            bodies,
            roots,
            options: self.options,
            generator: self.generator,
            cancellation: self.cancellation,
            mangler: self.mangler,
        })
    }
}

/// A configured compilation: a scan followed by a compile pass.
pub struct Compilation<'a> {
    context: &'a TypeSystemContext,
    bodies: &'a dyn MethodBodyProvider,
    roots: Vec<CompilationRoot>,
    options: CompilationOptions,
    generator: &'a dyn CodeGenerator,
    cancellation: Option<CancellationToken>,
    mangler: NameMangler,
}

impl Compilation<'_> {
    /// Returns the roots.
    #[must_use]
    pub fn roots(&self) -> &[CompilationRoot] {
        &self.roots
    }

    /// Returns the options.
    #[must_use]
    pub fn options(&self) -> &CompilationOptions {
        &self.options
    }

    /// Scans everything reachable from the roots.
    ///
    /// # Errors
    ///
    /// See [`IlScanner::scan`].
    pub fn scan(&self) -> Result<ScanResults> {
        let mut scanner =
            IlScanner::new(self.context, self.bodies).with_options(self.options.clone());
        if let Some(token) = &self.cancellation {
            scanner = scanner.with_cancellation(token.clone());
        }
        scanner.scan(&self.roots)
    }

    /// Compiles what `scan` found, devirtualizing with its results.
    ///
    /// # Errors
    ///
    /// Returns fatal node failures like the scan does, [`Error::ScannerMismatch`] if the
    /// pass reaches code the scan did not, [`Error::CompilationFailed`] if code generation
    /// fails for a required root, and [`Error::Cancelled`].
    pub fn compile(&self, scan: &ScanResults) -> Result<CompilationResults> {
        CompilePass {
            context: self.context,
            bodies: self.bodies,
            options: &self.options,
            generator: self.generator,
            cancellation: self.cancellation.as_ref(),
            mangler: &self.mangler,
        }
        .run(scan)
    }

    /// Scans, then compiles.
    ///
    /// # Errors
    ///
    /// See [`Compilation::scan`] and [`Compilation::compile`].
    pub fn run(&self) -> Result<CompilationResults> {
        let scan = self.scan()?;
        self.compile(&scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compilation::{EmitFailure, InMemoryObjectWriter, NativeCodeBlock, SymbolKind};
    use crate::devirtualization::DevirtualizationQuery;
    use crate::il::{InMemoryMethodBodyProvider, Instruction, MethodBody};
    use crate::scanner::{Dispatch, SiteDecision, VecRootProvider};
    use crate::test::TestWorld;
    use crate::typesystem::{MethodBuilder, MethodId, TypeBuilder};

    /// Fails for every method whose name is in the list.
    struct FailingGenerator(Vec<&'static str>);

    impl CodeGenerator for FailingGenerator {
        fn emit_code(
            &self,
            context: &TypeSystemContext,
            method: MethodId,
            body: &MethodBody,
            devirtualization: &dyn DevirtualizationQuery,
        ) -> std::result::Result<NativeCodeBlock, EmitFailure> {
            let name = context.method(method).name().to_string();
            if self.0.iter().any(|failing| *failing == name) {
                return Err(EmitFailure::new("unsupported construct"));
            }
            ListingCodeGenerator.emit_code(context, method, body, devirtualization)
        }
    }

    struct Program {
        world: TestWorld,
        bodies: InMemoryMethodBodyProvider,
        main: MethodId,
    }

    fn program() -> Program {
        let world = TestWorld::new();
        let ctx = &world.context;
        let program = TypeBuilder::new(ctx, "App", "Program").build().unwrap();
        let main = MethodBuilder::new(ctx, program, "Main")
            .static_method()
            .build()
            .unwrap();
        let bodies = InMemoryMethodBodyProvider::new();
        bodies.insert(
            main,
            MethodBody::new(vec![
                Instruction::NewObj(world.derived_ctor.into()),
                Instruction::callvirt_on(world.base_virtual, world.derived),
                Instruction::Ret,
            ]),
        );
        for method in [world.derived_ctor, world.derived_virtual] {
            bodies.insert(method, MethodBody::new(vec![Instruction::Ret]));
        }
        Program {
            world,
            bodies,
            main,
        }
    }

    #[test]
    fn run_devirtualizes_with_scan_results() {
        let Program {
            world,
            bodies,
            main,
        } = program();
        let roots = VecRootProvider::from(vec![CompilationRoot::method(main, "entry point")]);
        let compilation = CompilationBuilder::new(&world.context)
            .method_bodies(&bodies)
            .roots(&roots)
            .build()
            .unwrap();
        let results = compilation.run().unwrap();

        assert_eq!(results.methods().len(), 3);
        assert!(results.failures().is_empty());
        assert!(results
            .site_decisions(main)
            .contains(&SiteDecision::Call {
                offset: 1,
                callee: world.base_virtual,
                dispatch: Dispatch::Devirtualized(world.derived_virtual),
            }));

        let names: Vec<&str> = results.methods().iter().map(|m| m.symbol.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }

    #[test]
    fn failing_method_becomes_trap_stub() {
        let Program {
            world,
            bodies,
            main,
        } = program();
        let roots = VecRootProvider::from(vec![CompilationRoot::method(main, "entry point")]);
        let generator = FailingGenerator(vec!["Virtual"]);
        let compilation = CompilationBuilder::new(&world.context)
            .method_bodies(&bodies)
            .roots(&roots)
            .code_generator(&generator)
            .build()
            .unwrap();
        let results = compilation.run().unwrap();

        let stub = results.method(world.derived_virtual).unwrap();
        assert!(stub.is_stub);
        assert!(stub.code.is_trap());
        assert_eq!(results.failures().len(), 1);

        let mut writer = InMemoryObjectWriter::new();
        results.emit(&mut writer).unwrap();
        assert_eq!(writer.symbols.len(), 3);
        assert_eq!(
            writer
                .symbols
                .iter()
                .filter(|symbol| symbol.kind == SymbolKind::TrapStub)
                .count(),
            1
        );
    }

    #[test]
    fn failing_required_root_fails_compilation() {
        let Program {
            world,
            bodies,
            main,
        } = program();
        let roots = VecRootProvider::from(vec![CompilationRoot::method(main, "entry point")]);
        let generator = FailingGenerator(vec!["Main", "Virtual"]);
        let compilation = CompilationBuilder::new(&world.context)
            .method_bodies(&bodies)
            .roots(&roots)
            .code_generator(&generator)
            .options(CompilationOptions::single_threaded())
            .build()
            .unwrap();

        match compilation.run() {
            Err(Error::CompilationFailed {
                cause,
                method_failures,
            }) => {
                assert!(matches!(*cause, Error::CodeGeneration { .. }));
                assert_eq!(method_failures, vec!["App.Derived::Virtual".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn compile_pass_beyond_scan_is_a_mismatch() {
        let Program {
            world,
            bodies,
            main,
        } = program();
        let roots = VecRootProvider::from(vec![CompilationRoot::method(main, "entry point")]);
        let compilation = CompilationBuilder::new(&world.context)
            .method_bodies(&bodies)
            .roots(&roots)
            .build()
            .unwrap();
        let scan = compilation.scan().unwrap();

        bodies.insert(
            main,
            MethodBody::new(vec![Instruction::Call(world.base_ctor.into()), Instruction::Ret]),
        );
        bodies.insert(world.base_ctor, MethodBody::new(vec![Instruction::Ret]));
        assert_eq!(
            compilation.compile(&scan).unwrap_err(),
            Error::ScannerMismatch("App.Base::.ctor".to_string())
        );

        let lenient = CompilationBuilder::new(&world.context)
            .method_bodies(&bodies)
            .roots(&roots)
            .options(CompilationOptions::new().with_verify_scan(false))
            .build()
            .unwrap();
        assert!(lenient.compile(&scan).is_ok());
    }

    #[test]
    fn missing_configuration_is_reported() {
        let world = TestWorld::new();
        assert!(matches!(
            CompilationBuilder::new(&world.context).build(),
            Err(Error::Error(_))
        ));
    }

    #[test]
    fn cancelled_compilation() {
        let Program {
            world,
            bodies,
            main,
        } = program();
        let roots = VecRootProvider::from(vec![CompilationRoot::method(main, "entry point")]);
        let token = CancellationToken::new();
        let compilation = CompilationBuilder::new(&world.context)
            .method_bodies(&bodies)
            .roots(&roots)
            .cancellation(token.clone())
            .build()
            .unwrap();
        let scan = compilation.scan().unwrap();
        token.cancel();
        assert_eq!(compilation.compile(&scan).unwrap_err(), Error::Cancelled);
    }
}
