//! SPH smoothing kernels
//!
//! Two radially symmetric kernels with compact support `h`:
//! - [`StdKernel`]   (poly6): smooth at the origin, used for density and
//!   field interpolation
//! - [`SpikyKernel`]: sharp peak, non-vanishing gradient near the origin,
//!   used for gradient/laplacian estimates
//!
//! Both integrate to one over the support ball in 3D and are zero for
//! `distance >= h`.

use std::f64::consts::PI;

use super::states::NVec3;

/// Radially symmetric smoothing kernel
pub trait SphKernel {
    /// Support radius `h`
    fn radius(&self) -> f64;

    /// Kernel value W(d)
    fn weight(&self, distance: f64) -> f64;

    /// dW/dd
    fn first_derivative(&self, distance: f64) -> f64;

    /// d²W/dd²
    fn second_derivative(&self, distance: f64) -> f64;

    /// Slope of the falloff (same as [`SphKernel::first_derivative`])
    fn gradient_magnitude(&self, distance: f64) -> f64 {
        self.first_derivative(distance)
    }

    /// ∇W evaluated at `distance` along the unit vector pointing to the kernel center
    fn gradient(&self, distance: f64, direction_to_center: &NVec3) -> NVec3 {
        -self.first_derivative(distance) * direction_to_center
    }
}

/// Poly6 kernel, W = 315/(64πh³)·(1 − d²/h²)³
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StdKernel {
    h: f64,
    h2: f64,
    h3: f64,
    h5: f64,
}

impl StdKernel {
    pub fn new(h: f64) -> Self {
        let h2 = h * h;
        let h3 = h2 * h;
        let h5 = h2 * h3;
        Self { h, h2, h3, h5 }
    }
}

impl SphKernel for StdKernel {
    fn radius(&self) -> f64 {
        self.h
    }

    fn weight(&self, distance: f64) -> f64 {
        let d2 = distance * distance;
        if d2 >= self.h2 {
            return 0.0;
        }
        let x = 1.0 - d2 / self.h2;
        315.0 / (64.0 * PI * self.h3) * x * x * x
    }

    fn first_derivative(&self, distance: f64) -> f64 {
        if distance >= self.h {
            return 0.0;
        }
        let x = 1.0 - distance * distance / self.h2;
        -945.0 / (32.0 * PI * self.h5) * distance * x * x
    }

    fn second_derivative(&self, distance: f64) -> f64 {
        let d2 = distance * distance;
        if d2 >= self.h2 {
            return 0.0;
        }
        let x = d2 / self.h2;
        945.0 / (32.0 * PI * self.h5) * (1.0 - x) * (5.0 * x - 1.0)
    }
}

/// Spiky kernel, W = 15/(πh³)·(1 − d/h)³
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikyKernel {
    h: f64,
    h3: f64,
    h4: f64,
    h5: f64,
}

impl SpikyKernel {
    pub fn new(h: f64) -> Self {
        let h2 = h * h;
        let h3 = h2 * h;
        let h4 = h2 * h2;
        let h5 = h3 * h2;
        Self { h, h3, h4, h5 }
    }
}

impl SphKernel for SpikyKernel {
    fn radius(&self) -> f64 {
        self.h
    }

    fn weight(&self, distance: f64) -> f64 {
        if distance >= self.h {
            return 0.0;
        }
        let x = 1.0 - distance / self.h;
        15.0 / (PI * self.h3) * x * x * x
    }

    fn first_derivative(&self, distance: f64) -> f64 {
        if distance >= self.h {
            return 0.0;
        }
        let x = 1.0 - distance / self.h;
        -45.0 / (PI * self.h4) * x * x
    }

    fn second_derivative(&self, distance: f64) -> f64 {
        if distance >= self.h {
            return 0.0;
        }
        let x = 1.0 - distance / self.h;
        90.0 / (PI * self.h5) * x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ∫ 4πr² W(r) dr over [0, h] with the midpoint rule
    fn radial_integral(kernel: &impl SphKernel) -> f64 {
        let steps = 20_000;
        let dr = kernel.radius() / steps as f64;
        (0..steps)
            .map(|k| {
                let r = (k as f64 + 0.5) * dr;
                4.0 * PI * r * r * kernel.weight(r) * dr
            })
            .sum()
    }

    #[test]
    fn test_kernels_are_normalized() {
        for h in [0.5, 1.0, 2.3] {
            assert!((radial_integral(&StdKernel::new(h)) - 1.0).abs() < 1e-6);
            assert!((radial_integral(&SpikyKernel::new(h)) - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_std_kernel_shape() {
        let k = StdKernel::new(1.0);

        assert!(k.weight(0.0) > k.weight(0.3));
        assert!(k.weight(0.3) > k.weight(0.9));
        assert_eq!(k.weight(1.0), 0.0);
        assert_eq!(k.weight(1.5), 0.0);

        assert_eq!(k.gradient_magnitude(0.0), 0.0);
        assert_eq!(k.gradient_magnitude(1.0), 0.0);
        assert!(k.gradient_magnitude(0.5) < 0.0);
    }

    #[test]
    fn test_first_derivative_matches_finite_difference() {
        let k = StdKernel::new(1.3);
        let s = SpikyKernel::new(1.3);
        let eps = 1e-6;
        for d in [0.1, 0.4, 0.8, 1.1] {
            let fd = (k.weight(d + eps) - k.weight(d - eps)) / (2.0 * eps);
            assert!((fd - k.first_derivative(d)).abs() < 1e-5);

            let fd = (s.weight(d + eps) - s.weight(d - eps)) / (2.0 * eps);
            assert!((fd - s.first_derivative(d)).abs() < 1e-5);

            let fd2 = (k.first_derivative(d + eps) - k.first_derivative(d - eps)) / (2.0 * eps);
            assert!((fd2 - k.second_derivative(d)).abs() < 1e-4);
        }
    }

    #[test]
    fn test_gradient_points_away_from_center() {
        let s = SpikyKernel::new(1.0);
        let dir = NVec3::new(1.0, 0.0, 0.0);
        let g = s.gradient(0.5, &dir);
        // W decreases with distance, so -W' > 0 along the direction to the center
        assert!(g.x > 0.0);
        assert_eq!(g.y, 0.0);
    }
}
