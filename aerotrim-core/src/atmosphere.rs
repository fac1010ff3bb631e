//! ISA atmosphere and airspeed conversions after the BADA 3.x user manual (ch. 3.1).
//!
//! Speed conversion reference: https://aerotoolbox.com/airspeed-conversions/

use crate::imports::*;

/// Adiabatic index of air [-]
pub const KAPPA: f64 = 1.4;
/// Real gas constant of air \[m^2 / (K * s^2)\]
pub const R_AIR: f64 = 287.05287;
/// Gravitational acceleration \[m / s^2\]
pub const G0: f64 = 9.80665;
/// ISA temperature gradient below the tropopause \[K / m\]
pub const BETA_T: f64 = -0.0065;
/// Sea level standard temperature \[K\]
pub const T0: f64 = 288.15;
/// Sea level standard pressure \[Pa\]
pub const P0: f64 = 101325.0;
/// Sea level standard density \[kg / m^3\]
pub const RHO0: f64 = 1.225;
/// Sea level standard speed of sound \[m / s\]
pub const A0: f64 = 340.294;

/// ISA atmosphere with optional temperature deviation.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Atmosphere {
    /// temperature deviation from ISA \[K\]
    pub offset_deg: f64,
    /// tropopause altitude \[m\]
    pub alt_trop: f64,
}

impl Default for Atmosphere {
    fn default() -> Self {
        Self {
            offset_deg: 0.0,
            alt_trop: 11000.0,
        }
    }
}

impl SerdeAPI for Atmosphere {
    fn init(&mut self) -> anyhow::Result<()> {
        ensure!(
            self.offset_deg.is_finite() && self.alt_trop.is_finite() && self.alt_trop > 0.0,
            format_dbg!(self)
        );
        Ok(())
    }
}

impl Atmosphere {
    pub fn new(offset_deg: f64) -> Self {
        Self {
            offset_deg,
            ..Default::default()
        }
    }

    fn temp_trop(&self) -> f64 {
        T0 + self.offset_deg + BETA_T * self.alt_trop
    }

    fn pressure_trop(&self) -> f64 {
        P0 * ((self.temp_trop() - self.offset_deg) / T0).powf(-G0 / (BETA_T * R_AIR))
    }

    /// Returns air temperature \[K\] at altitude `alt` \[m\]
    pub fn temperature(&self, alt: f64) -> f64 {
        if alt < self.alt_trop {
            T0 + self.offset_deg + BETA_T * alt
        } else {
            self.temp_trop()
        }
    }

    /// Returns air pressure \[Pa\] at altitude `alt` \[m\].  
    /// The pressure profile is independent of the temperature deviation.
    pub fn pressure(&self, alt: f64) -> f64 {
        if alt < self.alt_trop {
            let te = self.temperature(alt);
            P0 * ((te - self.offset_deg) / T0).powf(-G0 / (BETA_T * R_AIR))
        } else {
            let te_isa_trop = T0 + BETA_T * self.alt_trop;
            self.pressure_trop() * (-G0 / (R_AIR * te_isa_trop) * (alt - self.alt_trop)).exp()
        }
    }

    /// Returns air density \[kg / m^3\] at altitude `alt` \[m\]
    pub fn density(&self, alt: f64) -> f64 {
        self.pressure(alt) / (R_AIR * self.temperature(alt))
    }

    /// Returns speed of sound \[m / s\] at altitude `alt` \[m\]
    pub fn speed_of_sound(&self, alt: f64) -> f64 {
        (KAPPA * R_AIR * self.temperature(alt)).sqrt()
    }

    pub fn mach_to_tas(&self, mach: f64, alt: f64) -> f64 {
        mach * self.speed_of_sound(alt)
    }

    pub fn tas_to_mach(&self, tas: f64, alt: f64) -> f64 {
        tas / self.speed_of_sound(alt)
    }

    pub fn tas_to_eas(&self, tas: f64, alt: f64) -> f64 {
        tas * (self.density(alt) / RHO0).sqrt()
    }

    pub fn eas_to_tas(&self, eas: f64, alt: f64) -> f64 {
        eas * (RHO0 / self.density(alt)).sqrt()
    }

    /// Calibrated to true airspeed \[m / s\], compressible flow.
    pub fn cas_to_tas(&self, cas: f64, alt: f64) -> f64 {
        let rho = self.density(alt);
        let p = self.pressure(alt);
        let mu = (KAPPA - 1.0) / KAPPA;
        let impact = (1.0 + mu / 2.0 * RHO0 / P0 * cas.powi(2)).powf(1.0 / mu);
        let ratio = (1.0 + P0 / p * (impact - 1.0)).powf(mu) - 1.0;
        (2.0 / mu * p / rho * ratio).sqrt()
    }

    /// True to calibrated airspeed \[m / s\], compressible flow.
    pub fn tas_to_cas(&self, tas: f64, alt: f64) -> f64 {
        let rho = self.density(alt);
        let p = self.pressure(alt);
        let mu = (KAPPA - 1.0) / KAPPA;
        let impact = (1.0 + mu / 2.0 * rho / p * tas.powi(2)).powf(1.0 / mu);
        let ratio = (1.0 + p / P0 * (impact - 1.0)).powf(mu) - 1.0;
        (2.0 / mu * P0 / RHO0 * ratio).sqrt()
    }

    pub fn mach_to_cas(&self, mach: f64, alt: f64) -> f64 {
        self.tas_to_cas(self.mach_to_tas(mach, alt), alt)
    }

    pub fn cas_to_mach(&self, cas: f64, alt: f64) -> f64 {
        self.tas_to_mach(self.cas_to_tas(cas, alt), alt)
    }

    /// Altitude \[m\] at which `cas` \[m / s\] and `mach` give the same true airspeed
    /// (BADA user manual 3.12, p. 12). Independent of the temperature deviation.
    pub fn crossover_altitude(&self, cas: f64, mach: f64) -> f64 {
        let exponent = KAPPA / (KAPPA - 1.0);
        let delta = ((1.0 + 0.5 * (KAPPA - 1.0) * (cas / A0).powi(2)).powf(exponent) - 1.0)
            / ((1.0 + 0.5 * (KAPPA - 1.0) * mach.powi(2)).powf(exponent) - 1.0);
        let theta = delta.powf(-BETA_T * R_AIR / G0);
        1000.0 / 6.5 * T0 * (1.0 - theta)
    }
}
