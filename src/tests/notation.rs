use crate::env::{Action, EnvBuilder, NotationEntry, Transition};
use crate::expr::BinderStyle;
use crate::level::mk_param;
use crate::name::str1;
use crate::pretty_printer::PpOptions;
use crate::tests::util::{arrow, ascii, cnst, render, render_default, test_env};
use crate::util::{ExprPtr, IsCtx};
use std::sync::Arc;

#[test]
fn infix_and_associativity() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let add = cnst("Nat.add", ctx);
        let p = cnst("p", ctx);
        let w = cnst("w", ctx);
        let pw = add.new_app(p, ctx).new_app(w, ctx);
        assert_eq!(render_default(ctx, pw), "p + w");

        let left_nested = add.new_app(pw, ctx).new_app(p, ctx);
        assert_eq!(render_default(ctx, left_nested), "p + w + p");

        let right_nested = add.new_app(p, ctx).new_app(pw, ctx);
        assert_eq!(render_default(ctx, right_nested), "p + (p + w)");
    })
}

#[test]
fn notation_disabled() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let add = cnst("Nat.add", ctx);
        let p = cnst("p", ctx);
        let w = cnst("w", ctx);
        let e = add.new_app(p, ctx).new_app(w, ctx);
        let plain = PpOptions { notation: false, ..PpOptions::default() };
        assert_eq!(render(ctx, e, plain), "Nat.add p w");
    })
}

#[test]
fn prefix_requires_unicode() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let not = cnst("not", ctx);
        let pred = cnst("pred", ctx);
        let p = cnst("p", ctx);
        let e = {
            let inner = pred.new_app(p, ctx);
            not.new_app(inner, ctx)
        };
        assert_eq!(render_default(ctx, e), "\u{00AC} pred p");
        // the entry is not ASCII-safe, so structural printing takes over
        assert_eq!(render(ctx, e, ascii()), "not (pred p)");
    })
}

#[test]
fn postfix() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let fact = cnst("fact", ctx);
        let p = cnst("p", ctx);
        let e = fact.new_app(p, ctx);
        assert_eq!(render_default(ctx, e), "p !");
    })
}

#[test]
fn numeral_entry() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let ft = cnst("forty_two", ctx);
        assert_eq!(render_default(ctx, ft), "42");
        let plain = PpOptions { notation: false, ..PpOptions::default() };
        assert_eq!(render(ctx, ft, plain), "forty_two");
    })
}

#[test]
fn level_placeholder_entry() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let poly_n = crate::name::name_from_str("poly", ctx);
        let one = ctx.zero().new_succ(ctx);
        let levels = ctx.alloc_levels_slice(&[one]);
        let e = ExprPtr::new_const(poly_n, levels, ctx);
        // with universes hidden the placeholder level matches anything
        assert_eq!(render_default(ctx, e), "P!");
        // with universes displayed only strict equality re-parses
        let universes = PpOptions { universes: true, ..PpOptions::default() };
        assert_eq!(render(ctx, e, universes), "poly.{1}");
    })
}

#[test]
fn pattern_slot_bound_twice() {
    let mut b = EnvBuilder::new();
    let zero = b.zero();
    let one = zero.new_succ(&mut b);
    let type0 = ExprPtr::new_sort(one, &mut b);
    let no_levels = b.alloc_levels_slice(&[]);
    let nat_n = str1("Nat", &mut b);
    b.add_axiom(nat_n, no_levels, type0);
    let nat = ExprPtr::new_const(nat_n, no_levels, &mut b);
    let nat2 = {
        let n2n = arrow(nat, nat, &mut b);
        arrow(nat, n2n, &mut b)
    };
    let dup_n = str1("dup", &mut b);
    b.add_axiom(dup_n, no_levels, nat2);
    let p_n = str1("p", &mut b);
    b.add_axiom(p_n, no_levels, nat);
    let w_n = str1("w", &mut b);
    b.add_axiom(w_n, no_levels, nat);

    // notation `D x` for `dup x x`
    b.set_token_prec("D", 100);
    let tok = b.intern_token("D");
    let dup = ExprPtr::new_const(dup_n, no_levels, &mut b);
    let v0 = ExprPtr::new_var(0, &mut b);
    let pattern = dup.new_app(v0, &mut b).new_app(v0, &mut b);
    let transitions: Arc<[Transition<'_>]> =
        Arc::from(vec![Transition { token: tok, action: Action::Expr { rbp: 100 } }]);
    b.add_notation(NotationEntry { head: dup_n, is_nud: true, transitions, pattern, safe_ascii: true, num: None });
    let env = b.finish();

    env.with_ctx(|ctx| {
        let dup = cnst("dup", ctx);
        let p = cnst("p", ctx);
        let w = cnst("w", ctx);
        let same = dup.new_app(p, ctx).new_app(p, ctx);
        assert_eq!(render_default(ctx, same), "D p");
        // the slot is already bound to a different subterm: no match
        let diff = dup.new_app(p, ctx).new_app(w, ctx);
        assert_eq!(render_default(ctx, diff), "dup p w");
    })
}

#[test]
fn unsupported_action_falls_back() {
    let mut b = EnvBuilder::new();
    let zero = b.zero();
    let one = zero.new_succ(&mut b);
    let type0 = ExprPtr::new_sort(one, &mut b);
    let no_levels = b.alloc_levels_slice(&[]);
    let nat_n = str1("Nat", &mut b);
    b.add_axiom(nat_n, no_levels, type0);
    let nat = ExprPtr::new_const(nat_n, no_levels, &mut b);
    let f_n = str1("f", &mut b);
    let n2n = arrow(nat, nat, &mut b);
    b.add_axiom(f_n, no_levels, n2n);
    let p_n = str1("p", &mut b);
    b.add_axiom(p_n, no_levels, nat);

    let tok = b.intern_token("E!");
    let f = ExprPtr::new_const(f_n, no_levels, &mut b);
    let v0 = ExprPtr::new_var(0, &mut b);
    let pattern = f.new_app(v0, &mut b);
    let transitions: Arc<[Transition<'_>]> = Arc::from(vec![Transition { token: tok, action: Action::Exprs }]);
    b.add_notation(NotationEntry { head: f_n, is_nud: true, transitions, pattern, safe_ascii: true, num: None });
    let env = b.finish();

    env.with_ctx(|ctx| {
        let f = cnst("f", ctx);
        let p = cnst("p", ctx);
        let e = f.new_app(p, ctx);
        // the entry matches, but its action is unsupported; printing
        // degrades to the structural form
        assert_eq!(render_default(ctx, e), "f p");
    })
}

#[test]
fn explicit_pattern_matches_all_positions() {
    let mut b = EnvBuilder::new();
    let zero = b.zero();
    let one = zero.new_succ(&mut b);
    let type0 = ExprPtr::new_sort(one, &mut b);
    let no_levels = b.alloc_levels_slice(&[]);
    let nat_n = str1("Nat", &mut b);
    b.add_axiom(nat_n, no_levels, type0);
    let nat = ExprPtr::new_const(nat_n, no_levels, &mut b);
    let p_n = str1("p", &mut b);
    b.add_axiom(p_n, no_levels, nat);
    let v0 = ExprPtr::new_var(0, &mut b);
    let v1 = ExprPtr::new_var(1, &mut b);
    let id_ty = {
        let inner_n = str1("a", &mut b);
        let inner = ExprPtr::new_pi(inner_n, BinderStyle::Default, v0, v1, &mut b);
        let a_n = str1("A", &mut b);
        ExprPtr::new_pi(a_n, BinderStyle::Implicit, type0, inner, &mut b)
    };
    let id_n = str1("id", &mut b);
    b.add_axiom(id_n, no_levels, id_ty);

    // an explicit pattern faces every argument, implicit ones included
    b.set_token_prec("%", 50);
    let tok = b.intern_token("%");
    let id = ExprPtr::new_const(id_n, no_levels, &mut b);
    let at_id = id.new_explicit(&mut b);
    let pattern = at_id.new_app(v1, &mut b).new_app(v0, &mut b);
    let transitions: Arc<[Transition<'_>]> =
        Arc::from(vec![Transition { token: tok, action: Action::Expr { rbp: 50 } }]);
    b.add_notation(NotationEntry { head: id_n, is_nud: false, transitions, pattern, safe_ascii: true, num: None });
    let env = b.finish();

    env.with_ctx(|ctx| {
        let id = cnst("id", ctx);
        let nat = cnst("Nat", ctx);
        let p = cnst("p", ctx);
        let e = id.new_app(nat, ctx).new_app(p, ctx);
        assert_eq!(render_default(ctx, e), "Nat % p");
    })
}

#[test]
fn level_placeholder_construction() {
    let env = test_env();
    env.with_ctx(|ctx| {
        let ph_n = ctx.name_cache().placeholder;
        let ph = mk_param(ph_n, ctx);
        assert!(crate::level::is_placeholder_level(ph, ctx));
        let u = mk_param(str1("u", ctx), ctx);
        assert!(!crate::level::is_placeholder_level(u, ctx));
    })
}
