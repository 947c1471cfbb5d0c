use crate::typesystem::{
    GenericParameterKind, MethodBuilder, MethodId, TypeBuilder, TypeId, TypeSystemContext,
    WellKnownType,
};

/// A small closed world covering the inheritance shapes the unit tests exercise.
///
/// ```text
/// Base                    virtual Virtual()
/// └─ Derived              override Virtual()
///    └─ Hiding            new virtual Virtual()
///       └─ BelowHiding    override Virtual()
/// GenericBase`1           virtual Get(!0), virtual Map<U>(!0, !!0)
/// └─ GenericDerived`1     override Get(!0), override Map<U>(!0, !!0)
/// GenericStruct`1         value type
/// IDrawable               abstract Draw()
/// IShape : IDrawable      Describe() with a default body
/// Widget : IShape         virtual Draw()
/// └─ Button               override Draw()
/// ExplicitImpl : IDrawable                    .override IDrawable::Draw
/// IConverter`1            abstract Convert(!0) -> !0
/// GenericExplicitImpl`1 : IConverter<!0>      .override IConverter<!0>::Convert
/// ```
pub struct TestWorld {
    pub context: TypeSystemContext,
    pub int32: TypeId,
    pub int64: TypeId,
    pub string: TypeId,

    pub base: TypeId,
    pub base_ctor: MethodId,
    pub base_virtual: MethodId,
    pub derived: TypeId,
    pub derived_ctor: MethodId,
    pub derived_virtual: MethodId,
    pub hiding: TypeId,
    pub hiding_virtual: MethodId,
    pub below_hiding: TypeId,
    pub below_hiding_virtual: MethodId,

    pub generic_base: TypeId,
    pub generic_base_get: MethodId,
    pub generic_base_map: MethodId,
    pub generic_derived: TypeId,
    pub generic_derived_get: MethodId,
    pub generic_derived_map: MethodId,
    pub generic_struct: TypeId,

    pub drawable_interface: TypeId,
    pub drawable_draw: MethodId,
    pub shape_interface: TypeId,
    pub shape_describe: MethodId,
    pub widget: TypeId,
    pub widget_draw: MethodId,
    pub derived_from_widget: TypeId,
    pub button_draw: MethodId,
    pub explicit_impl: TypeId,
    pub explicit_draw: MethodId,

    pub converter_interface: TypeId,
    pub converter_convert: MethodId,
    pub generic_explicit_impl: TypeId,
    pub generic_explicit_convert: MethodId,
}

impl TestWorld {
    pub fn new() -> Self {
        let context = TypeSystemContext::new();
        let ctx = &context;
        let int32 = ctx.well_known_type(WellKnownType::Int32);
        let int64 = ctx.well_known_type(WellKnownType::Int64);
        let string = ctx.well_known_type(WellKnownType::String);
        let t = ctx.get_generic_parameter(GenericParameterKind::Type, 0);
        let u = ctx.get_generic_parameter(GenericParameterKind::Method, 0);

        // Class hierarchy with a hiding slot in the middle
        let base = TypeBuilder::new(ctx, "App", "Base").build().unwrap();
        let base_ctor = MethodBuilder::constructor(ctx, base).build().unwrap();
        let base_virtual = MethodBuilder::new(ctx, base, "Virtual")
            .virtual_method()
            .build()
            .unwrap();

        let derived = TypeBuilder::new(ctx, "App", "Derived")
            .extends(base)
            .build()
            .unwrap();
        let derived_ctor = MethodBuilder::constructor(ctx, derived).build().unwrap();
        let derived_virtual = MethodBuilder::new(ctx, derived, "Virtual")
            .override_method()
            .build()
            .unwrap();

        let hiding = TypeBuilder::new(ctx, "App", "Hiding")
            .extends(derived)
            .build()
            .unwrap();
        let hiding_virtual = MethodBuilder::new(ctx, hiding, "Virtual")
            .virtual_method()
            .build()
            .unwrap();

        let below_hiding = TypeBuilder::new(ctx, "App", "BelowHiding")
            .extends(hiding)
            .build()
            .unwrap();
        let below_hiding_virtual = MethodBuilder::new(ctx, below_hiding, "Virtual")
            .override_method()
            .build()
            .unwrap();

        // Generics
        let generic_base = TypeBuilder::new(ctx, "App", "GenericBase`1")
            .generic(1)
            .build()
            .unwrap();
        let generic_base_get = MethodBuilder::new(ctx, generic_base, "Get")
            .virtual_method()
            .param(t)
            .build()
            .unwrap();
        let generic_base_map = MethodBuilder::new(ctx, generic_base, "Map")
            .virtual_method()
            .generic(1)
            .param(t)
            .param(u)
            .build()
            .unwrap();

        let base_of_t = ctx.get_instantiated_type(generic_base, &[t]).unwrap();
        let generic_derived = TypeBuilder::new(ctx, "App", "GenericDerived`1")
            .generic(1)
            .extends(base_of_t)
            .build()
            .unwrap();
        let generic_derived_get = MethodBuilder::new(ctx, generic_derived, "Get")
            .override_method()
            .param(t)
            .build()
            .unwrap();
        let generic_derived_map = MethodBuilder::new(ctx, generic_derived, "Map")
            .override_method()
            .generic(1)
            .param(t)
            .param(u)
            .build()
            .unwrap();

        let generic_struct = TypeBuilder::new(ctx, "App", "GenericStruct`1")
            .value_type()
            .generic(1)
            .build()
            .unwrap();

        // Interfaces
        let drawable_interface = TypeBuilder::new(ctx, "App", "IDrawable")
            .interface()
            .build()
            .unwrap();
        let drawable_draw = MethodBuilder::new(ctx, drawable_interface, "Draw")
            .abstract_method()
            .build()
            .unwrap();
        let shape_interface = TypeBuilder::new(ctx, "App", "IShape")
            .interface()
            .implements(drawable_interface)
            .build()
            .unwrap();
        let shape_describe = MethodBuilder::new(ctx, shape_interface, "Describe")
            .virtual_method()
            .build()
            .unwrap();

        let widget = TypeBuilder::new(ctx, "App", "Widget")
            .implements(shape_interface)
            .build()
            .unwrap();
        let widget_draw = MethodBuilder::new(ctx, widget, "Draw")
            .virtual_method()
            .build()
            .unwrap();
        let derived_from_widget = TypeBuilder::new(ctx, "App", "Button")
            .extends(widget)
            .build()
            .unwrap();
        let button_draw = MethodBuilder::new(ctx, derived_from_widget, "Draw")
            .override_method()
            .build()
            .unwrap();

        // Explicit implementations
        let explicit_impl = TypeBuilder::new(ctx, "App", "ExplicitImpl")
            .implements(drawable_interface)
            .build()
            .unwrap();
        let explicit_draw = MethodBuilder::new(ctx, explicit_impl, "App.IDrawable.Draw")
            .virtual_method()
            .final_method()
            .build()
            .unwrap();
        ctx.add_method_impl(explicit_impl, drawable_draw, explicit_draw)
            .unwrap();

        let converter_interface = TypeBuilder::new(ctx, "App", "IConverter`1")
            .interface()
            .generic(1)
            .build()
            .unwrap();
        let converter_convert = MethodBuilder::new(ctx, converter_interface, "Convert")
            .abstract_method()
            .param(t)
            .returns(t)
            .build()
            .unwrap();
        let converter_of_t = ctx
            .get_instantiated_type(converter_interface, &[t])
            .unwrap();
        let generic_explicit_impl = TypeBuilder::new(ctx, "App", "GenericExplicitImpl`1")
            .generic(1)
            .implements(converter_of_t)
            .build()
            .unwrap();
        let generic_explicit_convert =
            MethodBuilder::new(ctx, generic_explicit_impl, "App.IConverter.Convert")
                .virtual_method()
                .final_method()
                .param(t)
                .returns(t)
                .build()
                .unwrap();
        let convert_decl = ctx
            .get_method_for_instantiated_type(converter_convert, converter_of_t)
            .unwrap();
        ctx.add_method_impl(generic_explicit_impl, convert_decl, generic_explicit_convert)
            .unwrap();

        TestWorld {
            context,
            int32,
            int64,
            string,
            base,
            base_ctor,
            base_virtual,
            derived,
            derived_ctor,
            derived_virtual,
            hiding,
            hiding_virtual,
            below_hiding,
            below_hiding_virtual,
            generic_base,
            generic_base_get,
            generic_base_map,
            generic_derived,
            generic_derived_get,
            generic_derived_map,
            generic_struct,
            drawable_interface,
            drawable_draw,
            shape_interface,
            shape_describe,
            widget,
            widget_draw,
            derived_from_widget,
            button_draw,
            explicit_impl,
            explicit_draw,
            converter_interface,
            converter_convert,
            generic_explicit_impl,
            generic_explicit_convert,
        }
    }
}
