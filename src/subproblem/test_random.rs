use super::*;
use nalgebra::DMatrix;
use pcg_rand::Pcg64;
use rand::Rng;

const EXACT_METHODS: [SubproblemMethod; 3] = [
    SubproblemMethod::Aint,
    SubproblemMethod::MoreSorensen,
    SubproblemMethod::Dtrs,
];

fn random_workspace(rng: &mut Pcg64, second_order: bool) -> Workspace {
    let n = rng.gen_range(1..6);
    let m = n + rng.gen_range(0..5);
    let mut w = Workspace::new(n, m).unwrap();
    w.j = DMatrix::from_fn(m, n, |_, _| rng.gen_range(-1.0..1.0));
    w.f = DVector::from_fn(m, |_, _| rng.gen_range(-1.0..1.0));
    w.g = w.j.tr_mul(&w.f);
    w.delta = rng.gen_range(0.01..2.0);
    if second_order {
        let h = DMatrix::from_fn(n, n, |_, _| rng.gen_range(-2.0..2.0));
        w.hf = &h + h.transpose();
        w.use_second_derivatives = true;
    }
    w
}

fn model_value(w: &Workspace) -> f64 {
    let mut md = 0.5 * (&w.j * &w.d + &w.f).norm_squared();
    if w.use_second_derivatives {
        md += 0.5 * w.d.dot(&(&w.hf * &w.d));
    }
    md
}

fn step(options: &NllsOptions, w: &mut Workspace) -> f64 {
    calculate_step(options, w).unwrap();
    assert!(w.normd <= w.delta * (1. + 1e-12));
    assert_relative_eq!(w.normd, norm2(&w.d), epsilon = 1e-12);
    model_value(w)
}

#[test]
fn gauss_newton_steps_are_feasible_and_decrease_the_model() {
    let mut rng = Pcg64::new_unseeded();
    for _ in 0..50 {
        let mut w = random_workspace(&mut rng, false);
        let md0 = 0.5 * w.f.norm_squared();
        let options = NllsOptions::new()
            .with_model(Model::GaussNewton)
            .with_scaling(Scaling::None);
        for method in [SubproblemMethod::Dogleg].iter().chain(EXACT_METHODS.iter()) {
            let md = step(&options.with_method(*method), &mut w);
            assert!(md <= md0 + 1e-12, "{:?} increased the model", method);
        }
    }
}

#[test]
fn exact_methods_agree() {
    let mut rng = Pcg64::new_unseeded();
    for case in 0..60 {
        let mut w = random_workspace(&mut rng, case % 2 == 1);
        let md0 = 0.5 * w.f.norm_squared();
        // AINT never scales, so compare unscaled problems
        let options = NllsOptions::new()
            .with_model(Model::Newton)
            .with_scaling(Scaling::None);

        let md_dtrs = step(&options.with_method(SubproblemMethod::Dtrs), &mut w);
        assert!(md_dtrs <= md0 + 1e-12);
        let reduction = md0 - md_dtrs;

        let md_aint = step(&options.with_method(SubproblemMethod::Aint), &mut w);
        assert_relative_eq!(md_aint, md_dtrs, epsilon = 1e-6 * (1. + reduction));

        let md_ms = step(&options.with_method(SubproblemMethod::MoreSorensen), &mut w);
        assert!(md_ms >= md_dtrs - 1e-8 * (1. + reduction));
        assert!(md_ms <= md_dtrs + 1e-2 * reduction + 1e-12);
    }
}

#[test]
fn jacobian_scaled_steps_decrease_the_model() {
    let mut rng = Pcg64::new_unseeded();
    for case in 0..40 {
        let mut w = random_workspace(&mut rng, case % 2 == 1);
        let md0 = 0.5 * w.f.norm_squared();
        for method in [SubproblemMethod::MoreSorensen, SubproblemMethod::Dtrs] {
            let options = NllsOptions::new()
                .with_model(Model::Newton)
                .with_method(method);
            calculate_step(&options, &mut w).unwrap();
            assert!(w.normd <= w.delta * (1. + 1e-12));
            // normd is measured in the scaled variables
            let scaled = w.d.component_mul(&w.arena.scratch().scale);
            assert_relative_eq!(w.normd, norm2(&scaled), epsilon = 1e-10);
            assert!(model_value(&w) <= md0 + 1e-12, "{:?} increased the model", method);
        }
    }
}
