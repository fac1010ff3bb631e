//! Aerodynamic result records, result sets, and the aero-model interface.

use crate::atmosphere::Atmosphere;
use crate::avl::{AvlAeroCalculator, AvlConfig};
use crate::flight_conditions::{FlightConditions, FlightPoint};
use crate::geometry::AircraftGeometry;
use crate::imports::*;

/// Solver output for one flight point. Unresolved fields are NaN.
#[allow(non_snake_case)]
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct AeroRecord {
    /// angle of attack reported by the solver \[deg\]
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub alpha_res: f64,
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub CL: f64,
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub CD: f64,
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub CY: f64,
    /// rolling moment coefficient
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub Cl: f64,
    /// pitching moment coefficient
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub Cm: f64,
    /// yawing moment coefficient
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub Cn: f64,
    /// lift \[N\]
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub L: f64,
    /// drag \[N\]
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub D: f64,
    /// side force \[N\]
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub Y: f64,
    /// rolling moment about body x-axis \[N*m\]
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub l_b: f64,
    /// pitching moment about body y-axis \[N*m\]
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub m_b: f64,
    /// yawing moment about body z-axis \[N*m\]
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub n_b: f64,
    /// dynamic pressure \[Pa\]
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub q: f64,
    /// true airspeed \[m/s\]
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub v_tas: f64,
}

impl Default for AeroRecord {
    fn default() -> Self {
        Self {
            alpha_res: f64::NAN,
            CL: f64::NAN,
            CD: f64::NAN,
            CY: f64::NAN,
            Cl: f64::NAN,
            Cm: f64::NAN,
            Cn: f64::NAN,
            L: f64::NAN,
            D: f64::NAN,
            Y: f64::NAN,
            l_b: f64::NAN,
            m_b: f64::NAN,
            n_b: f64::NAN,
            q: f64::NAN,
            v_tas: f64::NAN,
        }
    }
}

impl AeroRecord {
    /// Dimensionalizes the coefficients with dynamic pressure `q` and the
    /// reference geometry.
    pub fn apply_forces(&mut self, q: f64, geom: &AircraftGeometry) {
        let qs = q * geom.s_ref;
        self.q = q;
        self.L = qs * self.CL;
        self.D = qs * self.CD;
        self.Y = qs * self.CY;
        self.l_b = qs * geom.b_ref * self.Cl;
        self.m_b = qs * geom.c_ref * self.Cm;
        self.n_b = qs * geom.b_ref * self.Cn;
    }
}

impl ApproxEq for AeroRecord {
    fn approx_eq(&self, other: &Self, tol: f64) -> bool {
        [
            (self.alpha_res, other.alpha_res),
            (self.CL, other.CL),
            (self.CD, other.CD),
            (self.CY, other.CY),
            (self.Cl, other.Cl),
            (self.Cm, other.Cm),
            (self.Cn, other.Cn),
            (self.L, other.L),
            (self.D, other.D),
            (self.Y, other.Y),
            (self.l_b, other.l_b),
            (self.m_b, other.m_b),
            (self.n_b, other.n_b),
            (self.q, other.q),
            (self.v_tas, other.v_tas),
        ]
        .iter()
        .all(|(a, b)| a.approx_eq(b, tol))
    }
}

/// Flat CSV row: the flight point followed by its record.
#[allow(non_snake_case)]
#[derive(Debug, Deserialize, Serialize)]
struct AeroRow {
    alpha: f64,
    beta: f64,
    altitude: f64,
    mach: f64,
    alpha_res: f64,
    CL: f64,
    CD: f64,
    CY: f64,
    Cl: f64,
    Cm: f64,
    Cn: f64,
    L: f64,
    D: f64,
    Y: f64,
    l_b: f64,
    m_b: f64,
    n_b: f64,
    q: f64,
    v_tas: f64,
}

impl From<(&FlightPoint, &AeroRecord)> for AeroRow {
    fn from((p, r): (&FlightPoint, &AeroRecord)) -> Self {
        Self {
            alpha: p.alpha,
            beta: p.beta,
            altitude: p.altitude,
            mach: p.mach,
            alpha_res: r.alpha_res,
            CL: r.CL,
            CD: r.CD,
            CY: r.CY,
            Cl: r.Cl,
            Cm: r.Cm,
            Cn: r.Cn,
            L: r.L,
            D: r.D,
            Y: r.Y,
            l_b: r.l_b,
            m_b: r.m_b,
            n_b: r.n_b,
            q: r.q,
            v_tas: r.v_tas,
        }
    }
}

impl From<AeroRow> for (FlightPoint, AeroRecord) {
    fn from(row: AeroRow) -> Self {
        (
            FlightPoint {
                alpha: row.alpha,
                beta: row.beta,
                altitude: row.altitude,
                mach: row.mach,
            },
            AeroRecord {
                alpha_res: row.alpha_res,
                CL: row.CL,
                CD: row.CD,
                CY: row.CY,
                Cl: row.Cl,
                Cm: row.Cm,
                Cn: row.Cn,
                L: row.L,
                D: row.D,
                Y: row.Y,
                l_b: row.l_b,
                m_b: row.m_b,
                n_b: row.n_b,
                q: row.q,
                v_tas: row.v_tas,
            },
        )
    }
}

/// Dense result set of a sweep: `records[i]` belongs to `points[i]`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct AeroResults {
    pub points: Vec<FlightPoint>,
    pub records: Vec<AeroRecord>,
}

impl SerdeAPI for AeroResults {
    const ACCEPTED_BYTE_FORMATS: &'static [&'static str] = &["yaml", "json", "csv"];
    const ACCEPTED_STR_FORMATS: &'static [&'static str] = &["yaml", "json", "csv"];

    fn init(&mut self) -> anyhow::Result<()> {
        ensure!(
            self.points.len() == self.records.len(),
            "{}\n{} flight points but {} records",
            format_dbg!(),
            self.points.len(),
            self.records.len()
        );
        Ok(())
    }

    fn to_writer<W: std::io::Write>(&self, wtr: W, format: &str) -> anyhow::Result<()> {
        match format.trim_start_matches('.').to_lowercase().as_str() {
            "yaml" | "yml" => serde_yaml::to_writer(wtr, self)?,
            "json" => serde_json::to_writer(wtr, self)?,
            "csv" => {
                let mut wtr = csv::Writer::from_writer(wtr);
                for row in self.points.iter().zip(self.records.iter()) {
                    wtr.serialize(AeroRow::from(row))?;
                }
                wtr.flush()?
            }
            _ => bail!(
                "Unsupported format {format:?}, must be one of {:?}",
                Self::ACCEPTED_BYTE_FORMATS
            ),
        }
        Ok(())
    }

    fn to_str(&self, format: &str) -> anyhow::Result<String> {
        Ok(
            match format.trim_start_matches('.').to_lowercase().as_str() {
                "yaml" | "yml" => self.to_yaml()?,
                "json" => self.to_json()?,
                "csv" => self.to_csv()?,
                _ => bail!(
                    "Unsupported format {format:?}, must be one of {:?}",
                    Self::ACCEPTED_STR_FORMATS
                ),
            },
        )
    }

    fn from_str<S: AsRef<str>>(contents: S, format: &str) -> anyhow::Result<Self> {
        Ok(
            match format.trim_start_matches('.').to_lowercase().as_str() {
                "yaml" | "yml" => Self::from_yaml(contents)?,
                "json" => Self::from_json(contents)?,
                "csv" => Self::from_reader(contents.as_ref().as_bytes(), "csv")?,
                _ => bail!(
                    "Unsupported format {format:?}, must be one of {:?}",
                    Self::ACCEPTED_STR_FORMATS
                ),
            },
        )
    }

    fn from_reader<R: std::io::Read>(rdr: R, format: &str) -> anyhow::Result<Self> {
        let mut deserialized: Self = match format.trim_start_matches('.').to_lowercase().as_str() {
            "yaml" | "yml" => serde_yaml::from_reader(rdr)?,
            "json" => serde_json::from_reader(rdr)?,
            "csv" => {
                let mut results = Self::default();
                let mut rdr = csv::Reader::from_reader(rdr);
                for row in rdr.deserialize::<AeroRow>() {
                    let (point, record): (FlightPoint, AeroRecord) = row?.into();
                    results.points.push(point);
                    results.records.push(record);
                }
                results
            }
            _ => bail!(
                "Unsupported format {format:?}, must be one of {:?}",
                Self::ACCEPTED_BYTE_FORMATS
            ),
        };
        deserialized.init()?;
        Ok(deserialized)
    }
}

impl AeroResults {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The only record of a single-point query
    pub fn single(&self) -> Option<&AeroRecord> {
        match self.records.as_slice() {
            [record] => Some(record),
            _ => None,
        }
    }

    pub fn alpha(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.alpha).collect()
    }

    pub fn lift(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.L).collect()
    }

    pub fn drag(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.D).collect()
    }

    pub fn cl(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.CL).collect()
    }

    pub fn cd(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.CD).collect()
    }

    pub fn v_tas(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.v_tas).collect()
    }

    /// Write (serialize) results to a CSV string
    pub fn to_csv(&self) -> anyhow::Result<String> {
        let mut buf = Vec::with_capacity(self.len());
        self.to_writer(&mut buf, "csv")?;
        Ok(String::from_utf8(buf)?)
    }
}

/// Computes aerodynamic results for a sweep of flight conditions.
pub trait AeroCalculator {
    fn geometry(&self) -> &AircraftGeometry;
    fn compute_aero(&mut self, conditions: &FlightConditions) -> anyhow::Result<AeroResults>;

    /// Serialized model settings other than geometry that change results.
    /// Memoized sweeps are keyed on it, so it must change whenever such a
    /// setting does.
    fn cache_salt(&self) -> anyhow::Result<String> {
        Ok(String::new())
    }
}

/// Aero model selection, deserialized from e.g. `model: avl`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum AeroModelConfig {
    Avl(AvlConfig),
}

impl Default for AeroModelConfig {
    fn default() -> Self {
        Self::Avl(AvlConfig::default())
    }
}

impl SerdeAPI for AeroModelConfig {
    fn init(&mut self) -> anyhow::Result<()> {
        match self {
            Self::Avl(config) => config.init(),
        }
    }
}

/// Registry of aero model implementations.
#[derive(Debug)]
pub enum AeroModel {
    Avl(AvlAeroCalculator),
}

impl AeroModel {
    pub fn new(
        config: &AeroModelConfig,
        geometry: AircraftGeometry,
        atmosphere: Atmosphere,
    ) -> anyhow::Result<Self> {
        Ok(match config {
            AeroModelConfig::Avl(avl) => {
                Self::Avl(AvlAeroCalculator::new(geometry, avl.clone(), atmosphere)?)
            }
        })
    }
}

impl AeroCalculator for AeroModel {
    fn geometry(&self) -> &AircraftGeometry {
        match self {
            Self::Avl(avl) => avl.geometry(),
        }
    }

    fn compute_aero(&mut self, conditions: &FlightConditions) -> anyhow::Result<AeroResults> {
        match self {
            Self::Avl(avl) => avl.compute_aero(conditions),
        }
    }
    fn cache_salt(&self) -> anyhow::Result<String> {
        match self {
            Self::Avl(avl) => avl.cache_salt(),
        }
    }
}
