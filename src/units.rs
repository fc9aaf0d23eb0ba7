/**
 * Conversion between physical (cgs) units and code units. The solver works
 * entirely in code units; conversions happen at the IO boundaries and when
 * physical rate coefficients are baked into the integrators at start-up.
 *
 * The three user-facing scalings are the density, pressure and time scales.
 * The mass, length and velocity scales follow from dimensional analysis.
 */
#[derive(Clone, Copy, Debug)]
pub struct Converter {
    mass_scale: f64,
    length_scale: f64,
    time_scale: f64,
}

const ERGS_PER_EV: f64 = 1.602176634e-12;




// ============================================================================
impl Converter {

    /// Build a converter from the density scale [g cm^-3], the pressure
    /// scale [Ba] and the time scale [s].
    pub fn new(dscale: f64, pscale: f64, tscale: f64) -> Self {
        let vscale = (pscale / dscale).sqrt();
        let lscale = vscale * tscale;

        Self {
            mass_scale: dscale * lscale * lscale * lscale,
            length_scale: lscale,
            time_scale: tscale,
        }
    }

    fn scale_factor(&self, m: f64, l: f64, t: f64) -> f64 {
        self.mass_scale.powf(m) * self.length_scale.powf(l) * self.time_scale.powf(t)
    }

    /// Convert a physical cgs value with dimensions [g^m cm^l s^t] to code
    /// units.
    pub fn to_code_units(&self, value: f64, m: f64, l: f64, t: f64) -> f64 {
        value / self.scale_factor(m, l, t)
    }

    /// Convert a code-unit value with dimensions [g^m cm^l s^t] back to cgs.
    pub fn from_code_units(&self, value: f64, m: f64, l: f64, t: f64) -> f64 {
        value * self.scale_factor(m, l, t)
    }

    pub fn ev_to_ergs(&self, ev: f64) -> f64 {
        ev * ERGS_PER_EV
    }
}




/**
 * Physical constants pre-scaled to code units, plus the floor values and the
 * grid dimensionality which are threaded through every component.
 */
#[derive(Clone, Copy, Debug)]
pub struct Constants {
    pub converter: Converter,
    pub nd: usize,
    pub dfloor: f64,
    pub pfloor: f64,
    pub tfloor: f64,
    pub pi: f64,
    pub hydrogen_mass: f64,
    pub boltzmann: f64,
    pub specific_gas_constant: f64,
    pub dust_extinction_cross_section: f64,
}




// ============================================================================
impl Constants {

    pub fn new(dscale: f64, pscale: f64, tscale: f64) -> Self {
        let converter = Converter::new(dscale, pscale, tscale);

        Self {
            converter,
            nd: 3,
            dfloor: 0.0,
            pfloor: 0.0,
            tfloor: 0.0,
            pi: std::f64::consts::PI,
            hydrogen_mass: converter.to_code_units(1.6735575e-24, 1.0, 0.0, 0.0),
            boltzmann: converter.to_code_units(1.380649e-16, 1.0, 2.0, -2.0),
            specific_gas_constant: converter.to_code_units(8.254398e7, 0.0, 2.0, -2.0),
            dust_extinction_cross_section: converter.to_code_units(5.0e-22, 0.0, 2.0, 0.0),
        }
    }
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::Converter;

    #[test]
    fn round_trips_through_code_units() {
        let converter = Converter::new(1.0e-21, 1.0e-9, 3.15e10);
        let rho = 2.3e-22;
        let code = converter.to_code_units(rho, 1.0, -3.0, 0.0);
        let back = converter.from_code_units(code, 1.0, -3.0, 0.0);

        assert!((back - rho).abs() / rho < 1e-12);
    }

    #[test]
    fn identity_scales_are_identity() {
        let converter = Converter::new(1.0, 1.0, 1.0);
        assert_eq!(converter.to_code_units(42.0, 1.0, 5.0, -3.0), 42.0);
    }
}
