use crate::env::{Action, EnvBuilder, Environment, NotationEntry, Transition};
use crate::expr::BinderStyle;
use crate::level::mk_param;
use crate::name::{name_from_str, str1};
use crate::pretty_printer::PpOptions;
use crate::util::{ExprPtr, IsCtx, TermCtx};
use num_bigint::BigUint;
use std::sync::Arc;

/// A non-dependent function type; the body never mentions the binder, so it
/// prints as an arrow.
pub(crate) fn arrow<'a>(a: ExprPtr<'a>, b: ExprPtr<'a>, ctx: &mut impl IsCtx<'a>) -> ExprPtr<'a> {
    let n = str1("a", ctx);
    ExprPtr::new_pi(n, BinderStyle::Default, a, b, ctx)
}

/// A constant with no universe arguments, from a dot-separated name.
pub(crate) fn cnst<'a>(s: &str, ctx: &mut impl IsCtx<'a>) -> ExprPtr<'a> {
    let n = name_from_str(s, ctx);
    let levels = ctx.alloc_levels_slice(&[]);
    ExprPtr::new_const(n, levels, ctx)
}

/// The signature every test prints against: arithmetic and logic constants,
/// an implicit-argument identity, coercions, notations, aliases, hidden
/// names, and an active namespace.
pub(crate) fn test_env<'p>() -> Environment<'p> {
    let mut b = EnvBuilder::new();
    let zero_l = b.zero();
    let one_l = zero_l.new_succ(&mut b);
    let type0 = ExprPtr::new_sort(one_l, &mut b);
    let prop = ExprPtr::new_sort(zero_l, &mut b);
    let no_levels = b.alloc_levels_slice(&[]);

    let nat_n = str1("Nat", &mut b);
    b.add_axiom(nat_n, no_levels, type0);
    let nat = ExprPtr::new_const(nat_n, no_levels, &mut b);
    let int_n = str1("Int", &mut b);
    b.add_axiom(int_n, no_levels, type0);
    let int = ExprPtr::new_const(int_n, no_levels, &mut b);

    // binary numeral constants
    let nat_to_nat = arrow(nat, nat, &mut b);
    let zero_n = b.name_cache().zero;
    b.add_axiom(zero_n, no_levels, nat);
    let one_n = b.name_cache().one;
    b.add_axiom(one_n, no_levels, nat);
    let bit0_n = b.name_cache().bit0;
    b.add_axiom(bit0_n, no_levels, nat_to_nat);
    let bit1_n = b.name_cache().bit1;
    b.add_axiom(bit1_n, no_levels, nat_to_nat);

    // plain function symbols and operands
    let f_n = str1("f", &mut b);
    b.add_axiom(f_n, no_levels, nat_to_nat);
    let nat2 = arrow(nat, nat_to_nat, &mut b);
    let g_n = str1("g", &mut b);
    b.add_axiom(g_n, no_levels, nat2);
    let p_n = str1("p", &mut b);
    b.add_axiom(p_n, no_levels, nat);
    let w_n = str1("w", &mut b);
    b.add_axiom(w_n, no_levels, nat);

    // id : Π {A : Type}, A → A
    let v0 = ExprPtr::new_var(0, &mut b);
    let v1 = ExprPtr::new_var(1, &mut b);
    let inner_n = str1("a", &mut b);
    let inner = ExprPtr::new_pi(inner_n, BinderStyle::Default, v0, v1, &mut b);
    let a_n = str1("A", &mut b);
    let id_ty = ExprPtr::new_pi(a_n, BinderStyle::Implicit, type0, inner, &mut b);
    let id_n = str1("id", &mut b);
    b.add_axiom(id_n, no_levels, id_ty);

    // pred : Nat → Prop, not : Prop → Prop, fact : Nat → Nat
    let pred_n = str1("pred", &mut b);
    let n2p = arrow(nat, prop, &mut b);
    b.add_axiom(pred_n, no_levels, n2p);
    let not_n = str1("not", &mut b);
    let p2p = arrow(prop, prop, &mut b);
    b.add_axiom(not_n, no_levels, p2p);
    let fact_n = str1("fact", &mut b);
    b.add_axiom(fact_n, no_levels, nat_to_nat);

    let add_n = name_from_str("Nat.add", &mut b);
    b.add_axiom(add_n, no_levels, nat2);

    // poly.{u} : Type
    let u_n = str1("u", &mut b);
    let u = mk_param(u_n, &mut b);
    let poly_uparams = b.alloc_levels_slice(&[u]);
    let poly_n = str1("poly", &mut b);
    b.add_axiom(poly_n, poly_uparams, type0);

    // coercions: a direct one and one with a preamble argument
    let of_nat_n = name_from_str("Int.of_nat", &mut b);
    let n2i = arrow(nat, int, &mut b);
    b.add_axiom(of_nat_n, no_levels, n2i);
    b.add_coercion(of_nat_n, 0);
    let c1_n = str1("c1", &mut b);
    let c1_ty = arrow(nat, n2i, &mut b);
    b.add_axiom(c1_n, no_levels, c1_ty);
    b.add_coercion(c1_n, 1);

    // namespace shortening, aliases, hidden names
    let nmf_n = name_from_str("n.m.f", &mut b);
    b.add_axiom(nmf_n, no_levels, nat);
    let ns = name_from_str("n.m", &mut b);
    b.push_namespace(ns);
    let qbar_n = name_from_str("q.bar", &mut b);
    b.add_axiom(qbar_n, no_levels, nat);
    let shadowed_alias = str1("f", &mut b);
    b.add_alias(qbar_n, shadowed_alias);
    let qbaz_n = name_from_str("q.baz", &mut b);
    b.add_axiom(qbaz_n, no_levels, nat);
    let baz_alias = str1("baz", &mut b);
    b.add_alias(qbaz_n, baz_alias);
    let hidden_n = name_from_str("_private.secret", &mut b);
    b.add_axiom(hidden_n, no_levels, nat);
    let user_n = name_from_str("q.secret", &mut b);
    b.add_hidden_name(hidden_n, user_n);

    // notations
    b.add_infix(add_n, "+", 65);
    b.add_prefix(not_n, "\u{00AC}", 40);
    b.add_postfix(fact_n, "!", 100);
    let forty_two_n = str1("forty_two", &mut b);
    b.add_axiom(forty_two_n, no_levels, nat);
    let ft_pattern = ExprPtr::new_const(forty_two_n, no_levels, &mut b);
    b.add_numeral(forty_two_n, ft_pattern, BigUint::from(42u8));

    // a level-sensitive entry: `poly.{_}` renders as a bare token
    let placeholder_n = b.name_cache().placeholder;
    let ph_level = mk_param(placeholder_n, &mut b);
    let poly_pat_levels = b.alloc_levels_slice(&[ph_level]);
    let poly_pattern = ExprPtr::new_const(poly_n, poly_pat_levels, &mut b);
    let tok = b.intern_token("P!");
    let transitions: Arc<[Transition<'p>]> = Arc::from(vec![Transition { token: tok, action: Action::Skip }]);
    b.add_notation(NotationEntry {
        head: poly_n,
        is_nud: true,
        transitions,
        pattern: poly_pattern,
        safe_ascii: true,
        num: None,
    });

    b.finish()
}

pub(crate) fn render<'t, 'p>(ctx: &mut TermCtx<'t, 'p>, e: ExprPtr<'t>, options: PpOptions) -> String {
    ctx.with_pp(options, |pp| pp.render_expr(e))
}

pub(crate) fn render_default<'t, 'p>(ctx: &mut TermCtx<'t, 'p>, e: ExprPtr<'t>) -> String {
    render(ctx, e, PpOptions::default())
}

pub(crate) fn ascii() -> PpOptions { PpOptions { unicode: false, ..PpOptions::default() } }
