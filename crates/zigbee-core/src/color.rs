//! Color model
//!
//! Value objects for colors in RGB, CIE xy and HSV space, conversion between
//! them through a device gamut, and reconciliation of the `color`,
//! `color_temp` and `color_mode` state keys.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ColorError;
use crate::units::{number_value, precision_round};

type Vector3 = [f64; 3];
type Matrix3 = [f64; 9];

/// Transfer function between linear light and the encoded RGB signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GammaCorrection {
    Linear,
    Srgb,
}

const SRGB_THRESHOLD: f64 = 0.003_130_8;
const SRGB_SLOPE: f64 = 12.92;
const SRGB_EXPONENT: f64 = 2.4;
const SRGB_OFFSET: f64 = 0.055;

impl GammaCorrection {
    fn encode(self, linear: f64) -> f64 {
        match self {
            GammaCorrection::Linear => linear.clamp(0.0, 1.0),
            GammaCorrection::Srgb => {
                if linear <= SRGB_THRESHOLD {
                    SRGB_SLOPE * linear
                } else {
                    (1.0 + SRGB_OFFSET) * linear.powf(1.0 / SRGB_EXPONENT) - SRGB_OFFSET
                }
            }
        }
    }

    fn decode(self, non_linear: f64) -> f64 {
        match self {
            GammaCorrection::Linear => non_linear.clamp(0.0, 1.0),
            GammaCorrection::Srgb => {
                if non_linear <= SRGB_SLOPE * SRGB_THRESHOLD {
                    non_linear / SRGB_SLOPE
                } else {
                    ((non_linear + SRGB_OFFSET) / (1.0 + SRGB_OFFSET)).powf(SRGB_EXPONENT)
                }
            }
        }
    }
}

/// RGB primaries and white point of a light source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gamut {
    pub name: &'static str,
    pub red: [f64; 2],
    pub green: [f64; 2],
    pub blue: [f64; 2],
    pub white: [f64; 2],
    pub gamma: GammaCorrection,
}

impl Gamut {
    pub const CIE1931: Gamut = Gamut {
        name: "Zigbee / CIE 1931",
        red: [0.7347, 0.2653],
        green: [0.2738, 0.7174],
        blue: [0.1666, 0.0089],
        white: [1.0 / 3.0, 1.0 / 3.0],
        gamma: GammaCorrection::Linear,
    };

    pub const PHILIPS_HUE: Gamut = Gamut {
        name: "Philips Hue",
        red: [0.675, 0.322],
        green: [0.4091, 0.518],
        blue: [0.167, 0.04],
        white: [1.0 / 3.0, 1.0 / 3.0],
        gamma: GammaCorrection::Srgb,
    };

    pub const PHILIPS_LIVING_COLORS: Gamut = Gamut {
        name: "Philips Hue Living Colors",
        red: [0.704, 0.296],
        green: [0.2151, 0.7106],
        blue: [0.138, 0.08],
        white: [1.0 / 3.0, 1.0 / 3.0],
        gamma: GammaCorrection::Srgb,
    };

    pub const WIDE: Gamut = Gamut {
        name: "Wide",
        red: [0.7347, 0.2653],
        green: [0.1152, 0.8264],
        blue: [0.1566, 0.0177],
        white: [0.3457, 0.3585],
        gamma: GammaCorrection::Srgb,
    };

    /// Gamut of a device, judged from its definition's vendor and description
    #[must_use]
    pub fn for_device(vendor: &str, description: &str) -> &'static Gamut {
        if vendor == "Philips" {
            if ["LivingColors", "Bloom", "Aura", "Iris"]
                .iter()
                .any(|family| description.contains(family))
            {
                return &Gamut::PHILIPS_LIVING_COLORS;
            }
            return &Gamut::PHILIPS_HUE;
        }
        &Gamut::CIE1931
    }

    fn matrices(&self) -> (Matrix3, Matrix3) {
        let [xr, yr, zr] = xy_to_xyz(self.red);
        let [xg, yg, zg] = xy_to_xyz(self.green);
        let [xb, yb, zb] = xy_to_xyz(self.blue);
        let white = xy_to_xyz(self.white);

        let primaries_inv = invert3x3([xr, xg, xb, yr, yg, yb, zr, zg, zb]);
        let [sr, sg, sb] = multiply(&primaries_inv, white);

        let to_xyz = [
            xr * sr, xg * sg, xb * sb,
            yr * sr, yg * sg, yb * sb,
            zr * sr, zg * sg, zb * sb,
        ];
        (to_xyz, invert3x3(to_xyz))
    }
}

fn xy_to_xyz([x, y]: [f64; 2]) -> Vector3 {
    [x / y, 1.0, (1.0 - x - y) / y]
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn invert3x3(m: Matrix3) -> Matrix3 {
    let [a, b, c, d, e, f, g, h, i] = m;
    let big_a = e * i - f * h;
    let big_b = -(d * i - f * g);
    let big_c = d * h - e * g;
    let det = a * big_a + b * big_b + c * big_c;

    if det.abs() < 1e-9 || !det.is_finite() {
        return [0.0; 9];
    }
    let inv = 1.0 / det;
    [
        big_a * inv,
        (c * h - b * i) * inv,
        (b * f - c * e) * inv,
        big_b * inv,
        (a * i - c * g) * inv,
        (c * d - a * f) * inv,
        big_c * inv,
        (b * g - a * h) * inv,
        (a * e - b * d) * inv,
    ]
    .map(finite_or_zero)
}

fn multiply(m: &Matrix3, v: Vector3) -> Vector3 {
    [
        m[0] * v[0] + m[1] * v[1] + m[2] * v[2],
        m[3] * v[0] + m[4] * v[1] + m[5] * v[2],
        m[6] * v[0] + m[7] * v[1] + m[8] * v[2],
    ]
}

/// RGB in [0..1] to XYZ
fn rgb_to_xyz(r: f64, g: f64, b: f64, gamut: &Gamut) -> Vector3 {
    let rgb = [gamut.gamma.decode(r), gamut.gamma.decode(g), gamut.gamma.decode(b)];
    multiply(&gamut.matrices().0, rgb)
}

/// XYZ to RGB in [0..1]
fn xyz_to_rgb(xyz: Vector3, gamut: &Gamut) -> Vector3 {
    multiply(&gamut.matrices().1, xyz).map(|c| gamut.gamma.encode(c))
}

fn xy_big_y_to_rgb(x: f64, y: f64, big_y: f64, gamut: &Gamut) -> Vector3 {
    let z = 1.0 - x - y;
    xyz_to_rgb([(big_y / y) * x, big_y, (big_y / y) * z], gamut)
}

fn find_maximum_y(x: f64, y: f64, gamut: &Gamut) -> f64 {
    if y <= 0.0 {
        return 0.0;
    }
    let mut bri = 1.0;
    for _ in 0..10 {
        let max = xy_big_y_to_rgb(x, y, bri, gamut)
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max);
        if max <= 0.0 || !max.is_finite() {
            return 0.0;
        }
        bri /= max;
    }
    bri
}

/// RGB in [0..255] to xyY
fn rgb_to_xy_big_y(r: f64, g: f64, b: f64, gamut: &Gamut) -> Vector3 {
    let (r, g, b) = (r / 255.0, g / 255.0, b / 255.0);
    if r < 1e-12 && g < 1e-12 && b < 1e-12 {
        let [x, y, z] = rgb_to_xyz(1.0, 1.0, 1.0, gamut);
        let sum = x + y + z;
        return [x / sum, y / sum, 0.0];
    }
    let [x, y, z] = rgb_to_xyz(r, g, b, gamut);
    let sum = x + y + z;
    [x / sum, y / sum, y]
}

/// xy (and optional luminance) to RGB in [0..255]
fn xy_to_rgb(x: f64, y: f64, big_y: Option<f64>, gamut: &Gamut) -> Vector3 {
    if y <= 0.0 {
        return [0.0; 3];
    }
    let luminance = big_y.unwrap_or_else(|| find_maximum_y(x, y, gamut));
    if luminance <= 0.0 || !luminance.is_finite() {
        return [0.0; 3];
    }
    xy_big_y_to_rgb(x, y, luminance, gamut).map(|c| (c * 255.0).clamp(0.0, 255.0))
}

/// RGB in [0..255] to HSV (hue 0..360, saturation and value 0..100)
fn rgb_to_hsv(r: f64, g: f64, b: f64) -> Vector3 {
    let (r, g, b) = (r / 255.0, g / 255.0, b / 255.0);
    let max = r.max(g).max(b);
    let d = max - r.min(g).min(b);

    let h = if d == 0.0 {
        0.0
    } else if max == r {
        ((g - b) / d + if g < b { 6.0 } else { 0.0 }) * 60.0
    } else if max == g {
        (2.0 + (b - r) / d) * 60.0
    } else {
        (4.0 + (r - g) / d) * 60.0
    };
    let s = if max == 0.0 { 0.0 } else { d / max * 100.0 };
    [h.clamp(0.0, 360.0), s.clamp(0.0, 100.0), (max * 100.0).clamp(0.0, 100.0)]
}

/// HSV to RGB in [0..255]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn hsv_to_rgb(h: f64, s: f64, v: f64) -> Vector3 {
    let (s, v) = (s / 100.0, v / 100.0);
    let i = (h / 60.0).trunc();
    let f = h / 60.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    let index = (i as i64).rem_euclid(6) as usize;

    let r = [v, q, p, p, t, v][index] * 255.0;
    let g = [t, v, v, q, p, p][index] * 255.0;
    let b = [p, p, t, v, v, q][index] * 255.0;
    [r.clamp(0.0, 255.0), g.clamp(0.0, 255.0), b.clamp(0.0, 255.0)]
}

/// Color in RGB space, components in [0..1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorRgb {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl ColorRgb {
    #[must_use]
    pub fn new(red: f64, green: f64, blue: f64) -> Self {
        Self { red, green, blue }
    }

    /// Parse `#rrggbb` or `rrggbb`
    pub fn from_hex(hex: &str) -> Result<Self, ColorError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        let num = u32::from_str_radix(digits, 16).map_err(|_| ColorError::InvalidHex(hex.to_string()))?;
        let channel = |shift: u32| f64::from((num >> shift) & 0xFF) / 255.0;
        Ok(Self::new(channel(16), channel(8), channel(0)))
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_hex(&self) -> String {
        let byte = |c: f64| (c * 255.0).round().clamp(0.0, 255.0) as u8;
        format!("#{:02x}{:02x}{:02x}", byte(self.red), byte(self.green), byte(self.blue))
    }

    #[must_use]
    pub fn to_hsv(&self) -> ColorHsv {
        let [h, s, v] = rgb_to_hsv(self.red * 255.0, self.green * 255.0, self.blue * 255.0);
        ColorHsv::new(Some(h), Some(s), Some(v))
    }

    #[must_use]
    pub fn to_xy(&self, gamut: &Gamut) -> ColorXy {
        let [x, y, big_y] = rgb_to_xy_big_y(self.red * 255.0, self.green * 255.0, self.blue * 255.0, gamut);
        ColorXy { x, y, luminance: Some(big_y) }
    }
}

/// Color in CIE 1931 xy space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorXy {
    pub x: f64,
    pub y: f64,
    /// Luminance (capital Y), when known
    pub luminance: Option<f64>,
}

impl ColorXy {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, luminance: None }
    }

    /// Point on the Planckian locus for a color temperature in mireds
    #[must_use]
    pub fn from_mireds(mireds: f64) -> Self {
        let t = (1_000_000.0 / mireds).round().clamp(1667.0, 25000.0);
        let x = if t <= 4000.0 {
            -0.266_123_9e9 / t.powi(3) - 0.234_358_9e6 / t.powi(2) + 0.877_695_6e3 / t + 0.179_910
        } else {
            -3.025_846_9e9 / t.powi(3) + 2.107_037_9e6 / t.powi(2) + 0.222_634_7e3 / t + 0.240_390
        };
        let y = if t <= 2222.0 {
            -1.106_381_4 * x.powi(3) - 1.348_110_20 * x.powi(2) + 2.185_558_32 * x - 0.202_196_83
        } else if t <= 4000.0 {
            -0.954_947_6 * x.powi(3) - 1.374_185_93 * x.powi(2) + 2.091_370_15 * x - 0.167_488_67
        } else {
            3.081_758_0 * x.powi(3) - 5.873_386_70 * x.powi(2) + 3.751_129_97 * x - 0.370_014_83
        };
        Self::new(x, y)
    }

    /// Correlated color temperature in mireds (McCamy's approximation)
    #[must_use]
    pub fn to_mireds(&self) -> f64 {
        let n = (self.x - 0.332) / (0.1858 - self.y);
        let kelvin = (437.0 * n.powi(3) + 3601.0 * n.powi(2) + 6861.0 * n + 5517.0).abs();
        1_000_000.0 / kelvin
    }

    #[must_use]
    pub fn to_rgb(&self, gamut: &Gamut) -> ColorRgb {
        let [r, g, b] = xy_to_rgb(self.x, self.y, self.luminance, gamut);
        ColorRgb::new(r / 255.0, g / 255.0, b / 255.0)
    }

    #[must_use]
    pub fn to_hsv(&self, gamut: &Gamut) -> ColorHsv {
        self.to_rgb(gamut).to_hsv()
    }

    #[must_use]
    pub fn rounded(&self, precision: i32) -> Self {
        Self::new(precision_round(self.x, precision), precision_round(self.y, precision))
    }

    #[must_use]
    pub fn to_object(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("x".into(), number_value(self.x));
        map.insert("y".into(), number_value(self.y));
        map
    }
}

/// One point of a hue correction curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HueCorrection {
    #[serde(rename = "in")]
    pub hue_in: f64,
    #[serde(rename = "out")]
    pub hue_out: f64,
}

/// Color in HSV space; hue 0..360, saturation and value 0..100
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColorHsv {
    pub hue: Option<f64>,
    pub saturation: Option<f64>,
    pub value: Option<f64>,
}

impl ColorHsv {
    #[must_use]
    pub fn new(hue: Option<f64>, saturation: Option<f64>, value: Option<f64>) -> Self {
        let hue = hue.map(|h| if h == 360.0 { h } else { h % 360.0 });
        Self { hue, saturation, value }
    }

    #[must_use]
    pub fn from_hsl(hue: f64, saturation: f64, lightness: f64) -> Self {
        let v = saturation * lightness.min(100.0 - lightness) / 100.0 + lightness;
        let s = if v == 0.0 { 0.0 } else { 200.0 * (1.0 - lightness / v) };
        Self::new(Some(hue), Some(s), Some(v))
    }

    #[must_use]
    pub fn to_rgb(&self) -> ColorRgb {
        let [r, g, b] = hsv_to_rgb(
            self.hue.unwrap_or(0.0),
            self.saturation.unwrap_or(100.0),
            self.value.unwrap_or(100.0),
        );
        ColorRgb::new(r / 255.0, g / 255.0, b / 255.0)
    }

    #[must_use]
    pub fn to_xy(&self, gamut: &Gamut) -> ColorXy {
        self.to_rgb().to_xy(gamut)
    }

    #[must_use]
    pub fn to_mireds(&self, gamut: &Gamut) -> f64 {
        self.to_xy(gamut).to_mireds()
    }

    /// Apply a hue correction curve by linear interpolation between its points
    #[must_use]
    pub fn corrected(&self, correction: &[HueCorrection]) -> Self {
        if correction.len() < 2 {
            return *self;
        }
        let base = self.hue.unwrap_or(0.0);
        let origin = HueCorrection { hue_in: 0.0, hue_out: 0.0 };
        let end = HueCorrection { hue_in: 359.0, hue_out: 359.0 };

        let left = correction
            .iter()
            .filter(|c| c.hue_in <= base)
            .max_by(|a, b| a.hue_in.total_cmp(&b.hue_in))
            .unwrap_or(&origin);
        let right = correction
            .iter()
            .filter(|c| c.hue_in > base)
            .min_by(|a, b| a.hue_in.total_cmp(&b.hue_in))
            .unwrap_or(&end);

        let ratio = 1.0 - (right.hue_in - base) / (right.hue_in - left.hue_in);
        let hue = (left.hue_out + ratio * (right.hue_out - left.hue_out)).round();
        Self::new(Some(hue), self.saturation, self.value)
    }

    #[must_use]
    pub fn rounded(&self, precision: i32) -> Self {
        let round = |v: Option<f64>| v.map(|v| precision_round(v, precision));
        Self::new(round(self.hue), round(self.saturation), round(self.value))
    }

    #[must_use]
    pub fn to_object(&self, include_value: bool) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(hue) = self.hue {
            map.insert("hue".into(), number_value(hue));
        }
        if let Some(saturation) = self.saturation {
            map.insert("saturation".into(), number_value(saturation));
        }
        if let (Some(value), true) = (self.value, include_value) {
            map.insert("value".into(), number_value(value));
        }
        map
    }
}

/// A requested color in exactly one representation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Color {
    Hsv(ColorHsv),
    Rgb(ColorRgb),
    Xy(ColorXy),
}

fn field(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

fn triple(raw: &str) -> Result<Vector3, ColorError> {
    let parts = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>().map(f64::trunc))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ColorError::InvalidTriple(raw.to_string()))?;
    <[f64; 3]>::try_from(parts).map_err(|_| ColorError::InvalidTriple(raw.to_string()))
}

impl Color {
    /// Interpret a converter argument in any of the accepted color notations
    pub fn from_converter_arg(value: &Value) -> Result<Color, ColorError> {
        let obj = match value {
            Value::String(hex) => return Ok(Color::Rgb(ColorRgb::from_hex(hex)?)),
            Value::Object(obj) => obj,
            _ => return Err(ColorError::NoColorDefinition),
        };

        if let (Some(x), Some(y)) = (field(obj, "x"), field(obj, "y")) {
            return Ok(Color::Xy(ColorXy::new(x, y)));
        }
        if let (Some(r), Some(g), Some(b)) = (field(obj, "r"), field(obj, "g"), field(obj, "b")) {
            return Ok(Color::Rgb(ColorRgb::new(r / 255.0, g / 255.0, b / 255.0)));
        }
        if let Some(rgb) = text(obj, "rgb") {
            let [r, g, b] = triple(rgb)?;
            return Ok(Color::Rgb(ColorRgb::new(r / 255.0, g / 255.0, b / 255.0)));
        }
        if let Some(hex) = text(obj, "hex") {
            return Ok(Color::Rgb(ColorRgb::from_hex(hex)?));
        }

        let (h, s) = (field(obj, "h"), field(obj, "s"));
        if let (Some(h), Some(s), Some(l)) = (h, s, field(obj, "l")) {
            return Ok(Color::Hsv(ColorHsv::from_hsl(h, s, l)));
        }
        if let Some(hsl) = text(obj, "hsl") {
            let [h, s, l] = triple(hsl)?;
            return Ok(Color::Hsv(ColorHsv::from_hsl(h, s, l)));
        }
        if let (Some(h), Some(s), Some(b)) = (h, s, field(obj, "b")) {
            return Ok(Color::Hsv(ColorHsv::new(Some(h), Some(s), Some(b))));
        }
        if let Some(hsb) = text(obj, "hsb") {
            let [h, s, b] = triple(hsb)?;
            return Ok(Color::Hsv(ColorHsv::new(Some(h), Some(s), Some(b))));
        }
        if let (Some(h), Some(s), Some(v)) = (h, s, field(obj, "v")) {
            return Ok(Color::Hsv(ColorHsv::new(Some(h), Some(s), Some(v))));
        }
        if let Some(hsv) = text(obj, "hsv") {
            let [h, s, v] = triple(hsv)?;
            return Ok(Color::Hsv(ColorHsv::new(Some(h), Some(s), Some(v))));
        }
        if h.is_some() || s.is_some() {
            return Ok(Color::Hsv(ColorHsv::new(h, s, None)));
        }

        let (hue, saturation) = (field(obj, "hue"), field(obj, "saturation"));
        if hue.is_some() || saturation.is_some() {
            return Ok(Color::Hsv(ColorHsv::new(hue, saturation, field(obj, "value"))));
        }
        Err(ColorError::NoColorDefinition)
    }

    #[must_use]
    pub fn is_hsv(&self) -> bool {
        matches!(self, Color::Hsv(_))
    }
}

/// Active color mode of a light
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    Hs,
    Xy,
    ColorTemp,
}

impl ColorMode {
    /// Mode from the `colorMode` attribute of the color control cluster
    #[must_use]
    pub fn from_zcl(value: u8) -> Option<ColorMode> {
        match value {
            0 => Some(ColorMode::Hs),
            1 => Some(ColorMode::Xy),
            2 => Some(ColorMode::ColorTemp),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ColorMode::Hs => "hs",
            ColorMode::Xy => "xy",
            ColorMode::ColorTemp => "color_temp",
        }
    }
}

/// Physical color temperature limits of an entity, in mireds
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColorTempRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ColorTempRange {
    #[must_use]
    pub fn clamp(&self, color_temp: f64) -> f64 {
        if let Some(min) = self.min.filter(|min| color_temp < *min) {
            tracing::debug!("Requested color_temp {} is lower than minimum supported {}, using minimum", color_temp, min);
            return min;
        }
        if let Some(max) = self.max.filter(|max| color_temp > *max) {
            tracing::debug!("Requested color_temp {} is higher than maximum supported {}, using maximum", color_temp, max);
            return max;
        }
        color_temp
    }
}

fn color_part(state: &Map<String, Value>, key: &str, part: &str) -> Option<f64> {
    state.get(key)?.get(part)?.as_f64()
}

fn has_color_part(state: &Map<String, Value>, key: &str, part: &str) -> bool {
    state
        .get(key)
        .and_then(|color| color.get(part))
        .is_some_and(|v| !v.is_null())
}

/// Reconcile `color`, `color_temp` and `color_mode` after a state change.
///
/// Returns only those three keys (suffixed with `postfix`); the caller merges
/// them into the full state. With `color_sync` off the new values are copied
/// verbatim.
#[must_use]
pub fn sync_color_state(
    new_state: &Map<String, Value>,
    old_state: &Map<String, Value>,
    color_sync: bool,
    range: ColorTempRange,
    postfix: &str,
    gamut: &Gamut,
) -> Map<String, Value> {
    let color_key = format!("color{postfix}");
    let mode_key = format!("color_mode{postfix}");
    let temp_key = format!("color_temp{postfix}");
    let mut result = Map::new();

    if !color_sync {
        for key in [&mode_key, &color_key, &temp_key] {
            if let Some(value) = new_state.get(key.as_str()) {
                result.insert(key.clone(), value.clone());
            }
        }
        return result;
    }

    let mode = if let Some(mode) = new_state.get(&mode_key).or_else(|| old_state.get(&mode_key)) {
        Some(mode.clone())
    } else if new_state.contains_key(&color_key) {
        let inferred = if has_color_part(new_state, &color_key, "hue") { "hs" } else { "xy" };
        Some(Value::from(inferred))
    } else if new_state.contains_key(&temp_key) {
        Some(Value::from("color_temp"))
    } else {
        None
    };
    if let Some(mode) = &mode {
        result.insert(mode_key.clone(), mode.clone());
    }

    let target_temp = old_state.contains_key(&temp_key) || new_state.contains_key(&temp_key);
    let target_hs = (has_color_part(old_state, &color_key, "hue") && has_color_part(old_state, &color_key, "saturation"))
        || (has_color_part(new_state, &color_key, "hue") && has_color_part(new_state, &color_key, "saturation"));
    let target_xy = (has_color_part(old_state, &color_key, "x") && has_color_part(old_state, &color_key, "y"))
        || (has_color_part(new_state, &color_key, "x") && has_color_part(new_state, &color_key, "y"));

    let pick = |part: &str| {
        color_part(new_state, &color_key, part).or_else(|| color_part(old_state, &color_key, part))
    };

    let mut color = Map::new();
    match mode.as_ref().and_then(Value::as_str) {
        Some("hs") => {
            let hue = pick("hue");
            let saturation = pick("saturation");
            if let Some(hue) = hue {
                color.insert("hue".into(), number_value(hue));
            }
            if let Some(saturation) = saturation {
                color.insert("saturation".into(), number_value(saturation));
            }
            if let (Some(hue), Some(saturation)) = (hue, saturation) {
                let hsv = ColorHsv::new(Some(hue), Some(saturation), None);
                if target_temp {
                    let mireds = range.clamp(precision_round(hsv.to_mireds(gamut), 0));
                    result.insert(temp_key.clone(), number_value(mireds));
                }
                if target_xy {
                    color.extend(hsv.to_xy(gamut).rounded(4).to_object());
                }
            }
        }
        Some("xy") => {
            let x = pick("x");
            let y = pick("y");
            if let Some(x) = x {
                color.insert("x".into(), number_value(x));
            }
            if let Some(y) = y {
                color.insert("y".into(), number_value(y));
            }
            if let (Some(x), Some(y)) = (x, y) {
                let xy = ColorXy::new(x, y);
                if target_temp {
                    let mireds = range.clamp(precision_round(xy.to_mireds(), 0));
                    result.insert(temp_key.clone(), number_value(mireds));
                }
                if target_hs {
                    color.extend(xy.to_hsv(gamut).rounded(0).to_object(false));
                }
            }
        }
        Some("color_temp") => {
            let temp = new_state.get(&temp_key).or_else(|| old_state.get(&temp_key)).cloned();
            if let Some(temp) = temp {
                if let Some(mireds) = temp.as_f64() {
                    let xy = ColorXy::from_mireds(mireds);
                    if target_xy {
                        color.extend(xy.rounded(4).to_object());
                    }
                    if target_hs {
                        color.extend(xy.to_hsv(gamut).rounded(0).to_object(false));
                    }
                }
                result.insert(temp_key.clone(), temp);
            }
        }
        _ => {}
    }

    if !color.is_empty() {
        result.insert(color_key, Value::Object(color));
    }
    result
}
