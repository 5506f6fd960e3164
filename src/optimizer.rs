//! Limited-memory BFGS with a backtracking line search.
//!
//! The optimizer works on a flat `f32` grid and an evaluation closure that
//! returns the loss and its gradient at a candidate point. The line search
//! re-invokes the closure as often as it needs to, so one reported iteration
//! may cost several forward/backward passes.

use std::collections::VecDeque;

pub(crate) const DEFAULT_MEMORY: usize = 10;

const ARMIJO_C1: f32 = 1e-4;
const MAX_BACKTRACKS: u32 = 20;
const CURVATURE_EPS: f32 = 1e-10;

struct CurvaturePair {
    s: Vec<f32>,
    y: Vec<f32>,
    rho: f32,
}

pub(crate) struct Lbfgs {
    memory: usize,
    pairs: VecDeque<CurvaturePair>,
    first_step: bool,
}

impl Lbfgs {
    pub(crate) fn new(memory: usize) -> Self {
        Self {
            memory,
            pairs: VecDeque::with_capacity(memory),
            first_step: true,
        }
    }

    /// Takes one quasi-Newton step from `x`, where `loss` and `grad` were
    /// evaluated at `x`. On success `x` is updated in place and the loss and
    /// gradient at the new point are returned; if the line search cannot find
    /// sufficient decrease, `x` is left untouched.
    pub(crate) fn step<F>(
        &mut self,
        x: &mut [f32],
        loss: f32,
        grad: &[f32],
        eval: &mut F,
    ) -> (f32, Vec<f32>)
    where
        F: FnMut(&[f32]) -> (f32, Vec<f32>),
    {
        let mut direction = self.two_loop(grad);
        let mut slope = dot(grad, &direction);
        if slope >= 0.0 {
            // the history no longer models a descent direction, drop it and
            // fall back to steepest descent
            self.pairs.clear();
            direction = grad.iter().map(|g| -g).collect();
            slope = -dot(grad, grad);
        }

        // the gradient scale is unknown on the very first step, so start small
        let mut t = if self.first_step {
            self.first_step = false;
            (1.0 / l1_norm(grad)).min(1.0)
        } else {
            1.0
        };

        let mut accepted = None;
        for _ in 0..MAX_BACKTRACKS {
            let candidate: Vec<f32> = x
                .iter()
                .zip(direction.iter())
                .map(|(xi, di)| xi + t * di)
                .collect();
            let (cand_loss, cand_grad) = eval(&candidate);

            if cand_loss <= loss + ARMIJO_C1 * t * slope {
                accepted = Some((candidate, cand_loss, cand_grad));
                break;
            }
            t *= 0.5;
        }

        let (candidate, new_loss, new_grad) = match accepted {
            Some(step) => step,
            None => return (loss, grad.to_vec()),
        };

        let s: Vec<f32> = candidate.iter().zip(x.iter()).map(|(c, xi)| c - xi).collect();
        let y: Vec<f32> = new_grad.iter().zip(grad.iter()).map(|(n, o)| n - o).collect();
        let sy = dot(&s, &y);
        // pairs with vanishing curvature would poison the inverse-hessian
        // estimate, skip them
        if sy > CURVATURE_EPS {
            if self.pairs.len() == self.memory {
                self.pairs.pop_front();
            }
            self.pairs.push_back(CurvaturePair {
                rho: 1.0 / sy,
                s,
                y,
            });
        }

        x.copy_from_slice(&candidate);
        (new_loss, new_grad)
    }

    /// Two-loop recursion: applies the implicit inverse-hessian estimate to
    /// the gradient and negates, yielding the search direction.
    fn two_loop(&self, grad: &[f32]) -> Vec<f32> {
        let mut q = grad.to_vec();

        let mut alphas = Vec::with_capacity(self.pairs.len());
        for pair in self.pairs.iter().rev() {
            let alpha = pair.rho * dot(&pair.s, &q);
            axpy(-alpha, &pair.y, &mut q);
            alphas.push(alpha);
        }

        if let Some(last) = self.pairs.back() {
            let gamma = (1.0 / last.rho) / dot(&last.y, &last.y);
            for v in q.iter_mut() {
                *v *= gamma;
            }
        }

        for (pair, alpha) in self.pairs.iter().zip(alphas.into_iter().rev()) {
            let beta = pair.rho * dot(&pair.y, &q);
            axpy(alpha - beta, &pair.s, &mut q);
        }

        for v in q.iter_mut() {
            *v = -*v;
        }
        q
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn l1_norm(a: &[f32]) -> f32 {
    a.iter().map(|x| x.abs()).sum()
}

fn axpy(a: f32, x: &[f32], y: &mut [f32]) {
    for (yi, xi) in y.iter_mut().zip(x.iter()) {
        *yi += a * xi;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    // f(x) = sum of (x_i - c_i)^2 with an anisotropic scale
    fn quadratic(x: &[f32]) -> (f32, Vec<f32>) {
        let center = [3.0_f32, -1.0, 0.5];
        let scale = [1.0_f32, 10.0, 0.2];

        let loss = x
            .iter()
            .zip(center.iter())
            .zip(scale.iter())
            .map(|((xi, ci), si)| si * (xi - ci) * (xi - ci))
            .sum();
        let grad = x
            .iter()
            .zip(center.iter())
            .zip(scale.iter())
            .map(|((xi, ci), si)| 2.0 * si * (xi - ci))
            .collect();
        (loss, grad)
    }

    #[test]
    fn converges_on_quadratic() {
        let mut opt = Lbfgs::new(DEFAULT_MEMORY);
        let mut x = vec![0.0_f32; 3];

        let (mut loss, mut grad) = quadratic(&x);
        for _ in 0..40 {
            let (l, g) = opt.step(&mut x, loss, &grad, &mut quadratic);
            loss = l;
            grad = g;
        }

        assert!(loss < 1e-6, "loss {} after 40 steps", loss);
        assert!((x[0] - 3.0).abs() < 1e-3);
        assert!((x[1] + 1.0).abs() < 1e-3);
        assert!((x[2] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn steps_never_increase_the_loss() {
        let mut opt = Lbfgs::new(DEFAULT_MEMORY);
        let mut x = vec![-2.0_f32, 4.0, 9.0];

        let (mut loss, mut grad) = quadratic(&x);
        for _ in 0..10 {
            let (l, g) = opt.step(&mut x, loss, &grad, &mut quadratic);
            assert!(l <= loss);
            loss = l;
            grad = g;
        }
    }

    #[test]
    fn flat_gradient_is_a_fixed_point() {
        let mut opt = Lbfgs::new(DEFAULT_MEMORY);
        let mut x = vec![3.0_f32, -1.0, 0.5];

        let (loss, grad) = quadratic(&x);
        let before = x.clone();
        opt.step(&mut x, loss, &grad, &mut quadratic);

        for (a, b) in x.iter().zip(before.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }
}
