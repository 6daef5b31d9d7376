//! Manufacturer codes for vendor-specific attributes and commands

use crate::options::ZclOptions;

/// Vendors whose manufacturer-specific clusters are driven by converters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    Legrand,
    Nxp,
    Signify,
    Lumi,
    Ikea,
    Sinope,
    MuellerLicht,
    Viessmann,
    Sunricher,
    Danfoss,
    Livolo,
}

impl Vendor {
    #[must_use]
    pub fn manufacturer_code(self) -> u16 {
        match self {
            Vendor::Legrand => 0x1021,
            Vendor::Nxp => 0x1037,
            Vendor::Signify => 0x100B,
            Vendor::Lumi => 0x115F,
            Vendor::Ikea => 0x117C,
            Vendor::Sinope => 0x119C,
            Vendor::MuellerLicht => 0x121B,
            Vendor::Viessmann => 0x1221,
            Vendor::Sunricher => 0x1224,
            Vendor::Danfoss => 0x1246,
            Vendor::Livolo => 0x1AD2,
        }
    }

    /// Frame options every manufacturer-scoped request for this vendor carries
    #[must_use]
    pub fn options(self) -> ZclOptions {
        let opts = ZclOptions::manufacturer(self.manufacturer_code());
        match self {
            Vendor::Lumi | Vendor::Legrand => opts.with_disable_default_response(true),
            _ => opts,
        }
    }

    #[must_use]
    pub fn from_code(code: u16) -> Option<Vendor> {
        [
            Vendor::Legrand,
            Vendor::Nxp,
            Vendor::Signify,
            Vendor::Lumi,
            Vendor::Ikea,
            Vendor::Sinope,
            Vendor::MuellerLicht,
            Vendor::Viessmann,
            Vendor::Sunricher,
            Vendor::Danfoss,
            Vendor::Livolo,
        ]
        .into_iter()
        .find(|v| v.manufacturer_code() == code)
    }
}
