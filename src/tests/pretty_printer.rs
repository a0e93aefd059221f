use crate::env::EnvBuilder;
use crate::expr::{mk_have, mk_let, mk_show, BinderStyle};
use crate::name::str1;
use crate::pretty_printer::{mk_formatter, PpOptions, ARROW_PREC, MAX_BP};
use crate::tests::util::{arrow, ascii, cnst, render, render_default, test_env};
use crate::util::{ExprPtr, IsCtx};

#[test]
fn pp_app_basic() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let f = cnst("f", ctx);
        let v0 = ExprPtr::new_var(0, ctx);
        let e = f.new_app(v0, ctx);
        assert_eq!(render_default(ctx, e), "f #0");
        let r = ctx.with_pp(PpOptions::default(), |pp| pp.pp(e));
        assert_eq!(r.rbp(), MAX_BP - 1);
    })
}

#[test]
fn pp_var_bare() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let v0 = ExprPtr::new_var(0, ctx);
        assert_eq!(render_default(ctx, v0), "#0");
    })
}

#[test]
fn pp_lambda_unicode_and_ascii() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let nat = cnst("Nat", ctx);
        let v0 = ExprPtr::new_var(0, ctx);
        let body = v0.new_app(v0, ctx);
        let x = str1("x", ctx);
        let e = ExprPtr::new_lambda(x, BinderStyle::Default, nat, body, ctx);
        assert_eq!(render_default(ctx, e), "λ (x : Nat), x x");
        assert_eq!(render(ctx, e, ascii()), "fun (x : Nat), x x");
    })
}

#[test]
fn pp_vacuous_pi_as_arrow() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let nat = cnst("Nat", ctx);
        let e = arrow(nat, nat, ctx);
        assert_eq!(render_default(ctx, e), "Nat → Nat");
        assert_eq!(render(ctx, e, ascii()), "Nat -> Nat");
        let r = ctx.with_pp(PpOptions::default(), |pp| pp.pp(e));
        assert_eq!(r.rbp(), ARROW_PREC - 1);
    })
}

#[test]
fn pp_named_pi_and_forall() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let nat = cnst("Nat", ctx);
        let f = cnst("f", ctx);
        let v0 = ExprPtr::new_var(0, ctx);
        let x = str1("x", ctx);
        let dependent = f.new_app(v0, ctx);
        let pi = ExprPtr::new_pi(x, BinderStyle::Default, nat, dependent, ctx);
        assert_eq!(render_default(ctx, pi), "Π (x : Nat), f x");
        assert_eq!(render(ctx, pi, ascii()), "Pi (x : Nat), f x");

        let pred = cnst("pred", ctx);
        let prop_body = pred.new_app(v0, ctx);
        let forall = ExprPtr::new_pi(x, BinderStyle::Default, nat, prop_body, ctx);
        assert_eq!(render_default(ctx, forall), "∀ (x : Nat), pred x");
        assert_eq!(render(ctx, forall, ascii()), "forall (x : Nat), pred x");
    })
}

#[test]
fn pp_sorts() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let zero = ctx.zero();
        let one = zero.new_succ(ctx);
        let prop = ExprPtr::new_sort(zero, ctx);
        let type0 = ExprPtr::new_sort(one, ctx);
        assert_eq!(render_default(ctx, prop), "Prop");
        assert_eq!(render_default(ctx, type0), "Type");
        let universes = PpOptions { universes: true, ..PpOptions::default() };
        assert_eq!(render(ctx, type0, universes.clone()), "Type.{1}");
        assert_eq!(render(ctx, prop, universes), "Prop");
    })
}

#[test]
fn pp_sort_predicative() {
    let mut b = EnvBuilder::new();
    b.set_impredicative(false);
    let env = b.finish();
    env.with_ctx(|ctx| {
        let zero = ctx.zero();
        let prop = ExprPtr::new_sort(zero, ctx);
        assert_eq!(render_default(ctx, prop), "Type");
    })
}

#[test]
fn pp_const_shortening() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let nmf = cnst("n.m.f", ctx);
        assert_eq!(render_default(ctx, nmf), "f");
        let full = PpOptions { full_names: true, ..PpOptions::default() };
        assert_eq!(render(ctx, nmf, full), "n.m.f");

        // `q.baz` has an unshadowed alias; `q.bar`'s alias `f` is shadowed
        // by `n.m.f` through the active namespace
        let qbaz = cnst("q.baz", ctx);
        assert_eq!(render_default(ctx, qbaz), "baz");
        let qbar = cnst("q.bar", ctx);
        assert_eq!(render_default(ctx, qbar), "q.bar");
    })
}

#[test]
fn pp_hidden_names() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let hidden = cnst("_private.secret", ctx);
        assert_eq!(render_default(ctx, hidden), "q.secret");
        let private = PpOptions { private_names: true, ..PpOptions::default() };
        assert_eq!(render(ctx, hidden, private), "_private.secret");
    })
}

#[test]
fn pp_let_chain() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let nat = cnst("Nat", ctx);
        let f = cnst("f", ctx);
        let g = cnst("g", ctx);
        let p = cnst("p", ctx);
        let fp = f.new_app(p, ctx);
        let v0 = ExprPtr::new_var(0, ctx);
        let v1 = ExprPtr::new_var(1, ctx);
        let body2 = g.new_app(v0, ctx).new_app(v1, ctx);
        let b_n = str1("b", ctx);
        let inner = mk_let(b_n, nat, v0, body2, ctx);
        let a_n = str1("a", ctx);
        let e = mk_let(a_n, nat, fp, inner, ctx);
        assert_eq!(render_default(ctx, e), "let a := f p, b := a in g b b");
    })
}

#[test]
fn pp_let_single() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let nat = cnst("Nat", ctx);
        let f = cnst("f", ctx);
        let p = cnst("p", ctx);
        let fp = f.new_app(p, ctx);
        let v0 = ExprPtr::new_var(0, ctx);
        let body = f.new_app(v0, ctx);
        let a_n = str1("a", ctx);
        let e = mk_let(a_n, nat, fp, body, ctx);
        assert_eq!(render_default(ctx, e), "let a := f p in f a");
    })
}

#[test]
fn pp_let_discards_unused_binding() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let nat = cnst("Nat", ctx);
        let f = cnst("f", ctx);
        let p = cnst("p", ctx);
        let fp = f.new_app(p, ctx);
        let one = cnst("one", ctx);
        let a_n = str1("a", ctx);
        let e = mk_let(a_n, nat, fp, one, ctx);
        assert_eq!(render_default(ctx, e), "1");
    })
}

#[test]
fn pp_let_picks_fresh_name() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let nat = cnst("Nat", ctx);
        let f = cnst("f", ctx);
        let g = cnst("g", ctx);
        let p = cnst("p", ctx);
        let a_const = cnst("a", ctx);
        let fp = f.new_app(p, ctx);
        let v0 = ExprPtr::new_var(0, ctx);
        let body = g.new_app(v0, ctx).new_app(a_const, ctx);
        let a_n = str1("a", ctx);
        let e = mk_let(a_n, nat, fp, body, ctx);
        assert_eq!(render_default(ctx, e), "let a1 := f p in g a1 a");
    })
}

#[test]
fn pp_have_and_show() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let pred = cnst("pred", ctx);
        let p = cnst("p", ctx);
        let ty = pred.new_app(p, ctx);
        let v0 = ExprPtr::new_var(0, ctx);
        let h_n = str1("h", ctx);
        let have_ = mk_have(h_n, ty, BinderStyle::Default, p, v0, ctx);
        assert_eq!(render_default(ctx, have_), "have h : pred p, from p, h");

        let visible = mk_have(h_n, ty, BinderStyle::Contextual, p, v0, ctx);
        assert_eq!(render_default(ctx, visible), "have h [visible] : pred p, from p, h");

        let show_ = mk_show(ty, p, ctx);
        assert_eq!(render_default(ctx, show_), "show pred p, from p");
    })
}

#[test]
fn pp_explicit_macro() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let f = cnst("f", ctx);
        let p = cnst("p", ctx);
        let e = f.new_explicit(ctx).new_app(p, ctx);
        assert_eq!(render_default(ctx, e), "@f p");
    })
}

#[test]
fn pp_generic_macro() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let p = cnst("p", ctx);
        let w = cnst("w", ctx);
        let quote = str1("quote", ctx);
        let e = ExprPtr::new_macro(quote, &[p, w], ctx);
        assert_eq!(render_default(ctx, e), "[quote p w]");
    })
}

#[test]
fn pp_transparent_annotations() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let nat = cnst("Nat", ctx);
        let p = cnst("p", ctx);
        let typed_n = ctx.name_cache().typed_expr;
        let typed = ExprPtr::new_macro(typed_n, &[nat, p], ctx);
        assert_eq!(render_default(ctx, typed), "p");
        let lv_n = ctx.name_cache().let_value;
        let lv = ExprPtr::new_annotation(lv_n, p, ctx);
        assert_eq!(render_default(ctx, lv), "p");
    })
}

#[test]
fn pp_placeholder() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let ph = crate::expr::mk_placeholder(ctx);
        assert_eq!(render_default(ctx, ph), "_");
    })
}

#[test]
fn pp_implicit_args() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let id = cnst("id", ctx);
        let nat = cnst("Nat", ctx);
        let p = cnst("p", ctx);
        let e = id.new_app(nat, ctx).new_app(p, ctx);
        // the implicit type argument vanishes by default
        assert_eq!(render_default(ctx, e), "id p");
        let implicit = PpOptions { implicit: true, ..PpOptions::default() };
        assert_eq!(render(ctx, e, implicit), "@id Nat p");
    })
}

#[test]
fn pp_coercion_elision() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let of_nat = cnst("Int.of_nat", ctx);
        let p = cnst("p", ctx);
        let e = of_nat.new_app(p, ctx);
        assert_eq!(render_default(ctx, e), "Int.of_nat p");
        let elide = PpOptions { coercions: false, ..PpOptions::default() };
        assert_eq!(render(ctx, e, elide), "p");
    })
}

#[test]
fn pp_coercion_with_preamble() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let c1 = cnst("c1", ctx);
        let p = cnst("p", ctx);
        let w = cnst("w", ctx);
        let elide = PpOptions { coercions: false, ..PpOptions::default() };
        // k + 1 spine arguments: only the trailing argument survives
        let e = c1.new_app(p, ctx).new_app(w, ctx);
        assert_eq!(render(ctx, e, elide.clone()), "w");
        // fewer than k + 1: nothing to elide
        let partial = c1.new_app(p, ctx);
        assert_eq!(render(ctx, partial, elide.clone()), "c1 p");
        // more than k + 1: the exposed application prints normally
        let over = c1.new_app(p, ctx).new_app(p, ctx).new_app(w, ctx);
        assert_eq!(render(ctx, over, elide), "p w");
    })
}

#[test]
fn pp_budget_ellipsis() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let f = cnst("f", ctx);
        let p = cnst("p", ctx);
        let mut e = p;
        for _ in 0..6 {
            e = f.new_app(e, ctx);
        }
        let shallow = PpOptions { max_depth: 3, ..PpOptions::default() };
        assert!(render(ctx, e, shallow.clone()).contains('\u{2026}'));
        let shallow_ascii = PpOptions { unicode: false, ..shallow };
        assert!(render(ctx, e, shallow_ascii).contains("..."));
        // the default budgets leave the term intact
        assert!(!render_default(ctx, e).contains('\u{2026}'));

        let starved = PpOptions { max_steps: 2, ..PpOptions::default() };
        assert!(render(ctx, e, starved).contains('\u{2026}'));
    })
}

#[test]
fn pp_beta_option() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let nat = cnst("Nat", ctx);
        let p = cnst("p", ctx);
        let v0 = ExprPtr::new_var(0, ctx);
        let x = str1("x", ctx);
        let lam = ExprPtr::new_lambda(x, BinderStyle::Default, nat, v0, ctx);
        let e = lam.new_app(p, ctx);
        assert_eq!(render_default(ctx, e), "(λ (x : Nat), x) p");
        let beta = PpOptions { beta: true, ..PpOptions::default() };
        assert_eq!(render(ctx, e, beta), "p");
    })
}

#[test]
fn pp_binder_styles() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let nat = cnst("Nat", ctx);
        let v0 = ExprPtr::new_var(0, ctx);
        let x = str1("x", ctx);
        let imp = ExprPtr::new_lambda(x, BinderStyle::Implicit, nat, v0, ctx);
        assert_eq!(render_default(ctx, imp), "λ {x : Nat}, x");
        let strict = ExprPtr::new_lambda(x, BinderStyle::StrictImplicit, nat, v0, ctx);
        assert_eq!(render_default(ctx, strict), "λ ⦃x : Nat⦄, x");
        assert_eq!(render(ctx, strict, ascii()), "fun {{x : Nat}}, x");
        let inst = ExprPtr::new_lambda(x, BinderStyle::InstImplicit, nat, v0, ctx);
        assert_eq!(render_default(ctx, inst), "λ [x : Nat], x");
    })
}

#[test]
fn pp_binder_grouping() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let nat = cnst("Nat", ctx);
        let int = cnst("Int", ctx);
        let g = cnst("g", ctx);
        let v0 = ExprPtr::new_var(0, ctx);
        let v1 = ExprPtr::new_var(1, ctx);
        let x = str1("x", ctx);
        let y = str1("y", ctx);

        let body = g.new_app(v1, ctx).new_app(v0, ctx);
        let inner = ExprPtr::new_lambda(y, BinderStyle::Default, nat, body, ctx);
        let same = ExprPtr::new_lambda(x, BinderStyle::Default, nat, inner, ctx);
        assert_eq!(render_default(ctx, same), "λ (x y : Nat), g x y");

        let inner2 = ExprPtr::new_lambda(y, BinderStyle::Default, int, v1, ctx);
        let mixed = ExprPtr::new_lambda(x, BinderStyle::Default, nat, inner2, ctx);
        assert_eq!(render_default(ctx, mixed), "λ (x : Nat) (y : Int), x");
    })
}

#[test]
fn pp_numerals() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let zero = cnst("zero", ctx);
        let one = cnst("one", ctx);
        let bit0 = cnst("bit0", ctx);
        let bit1 = cnst("bit1", ctx);
        assert_eq!(render_default(ctx, zero), "0");
        assert_eq!(render_default(ctx, one), "1");
        let two = bit0.new_app(one, ctx);
        let five = bit1.new_app(two, ctx);
        assert_eq!(render_default(ctx, five), "5");

        let add = cnst("Nat.add", ctx);
        let sum = add.new_app(zero, ctx).new_app(one, ctx);
        assert_eq!(render_default(ctx, sum), "0 + 1");
    })
}

#[test]
fn pp_formatter_factory() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let f = cnst("f", ctx);
        let p = cnst("p", ctx);
        let e = f.new_app(p, ctx);
        let arrow_e = {
            let nat = cnst("Nat", ctx);
            arrow(nat, nat, ctx)
        };
        let mut formatter = mk_formatter(ctx, PpOptions::default());
        assert_eq!(formatter.format_str(e, PpOptions::default()), "f p");
        assert_eq!(formatter.format_str(arrow_e, ascii()), "Nat -> Nat");
        assert_eq!(formatter.format_str(arrow_e, PpOptions::default()), "Nat → Nat");
    })
}

#[test]
fn pp_options_from_json() {
    let parsed: PpOptions = serde_json::from_str(r#"{ "unicode": false, "max_depth": 8 }"#).unwrap();
    assert!(!parsed.unicode);
    assert_eq!(parsed.max_depth, 8);
    // unmentioned fields keep their defaults
    assert_eq!(parsed.indent, 2);
    assert!(parsed.notation);
}
