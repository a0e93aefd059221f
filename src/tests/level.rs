use crate::level::mk_param;
use crate::name::str1;
use crate::pretty_printer::PpOptions;
use crate::tests::util::{render, test_env};
use crate::util::{ExprPtr, IsCtx};

fn universes() -> PpOptions { PpOptions { universes: true, ..PpOptions::default() } }

#[test]
fn level_offsets() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let u = mk_param(str1("u", ctx), ctx);
        let e = ExprPtr::new_sort(u.new_succ(ctx), ctx);
        assert_eq!(render(ctx, e, universes()), "Type.{u+1}");
    })
}

#[test]
fn level_max_and_imax() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let u = mk_param(str1("u", ctx), ctx);
        let v = mk_param(str1("v", ctx), ctx);
        let max_uv = u.new_max(v, ctx);
        let e = ExprPtr::new_sort(max_uv, ctx);
        assert_eq!(render(ctx, e, universes()), "Type.{max u v}");

        // composite levels parenthesize under an offset
        let bumped = ExprPtr::new_sort(max_uv.new_succ(ctx), ctx);
        assert_eq!(render(ctx, bumped, universes()), "Type.{(max u v)+1}");

        let imax_uv = u.new_imax(v, ctx);
        let e2 = ExprPtr::new_sort(imax_uv, ctx);
        assert_eq!(render(ctx, e2, universes()), "Type.{imax u v}");
    })
}

#[test]
fn const_level_args() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let poly_n = crate::name::name_from_str("poly", ctx);
        let u = mk_param(str1("u", ctx), ctx);
        let levels = ctx.alloc_levels_slice(&[u]);
        let e = ExprPtr::new_const(poly_n, levels, ctx);
        assert_eq!(render(ctx, e, universes()), "poly.{u}");
        // level list hidden entirely when universe display is off
        let plain = PpOptions { notation: false, ..PpOptions::default() };
        assert_eq!(render(ctx, e, plain), "poly");

        let v = mk_param(str1("v", ctx), ctx);
        let max_uv = u.new_max(v, ctx);
        let max_levels = ctx.alloc_levels_slice(&[max_uv]);
        let e2 = ExprPtr::new_const(poly_n, max_levels, ctx);
        assert_eq!(render(ctx, e2, universes()), "poly.{(max u v)}");
    })
}
