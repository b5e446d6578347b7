//! Named page sizes and the identifier lookup used by `/convert`.
//!
//! Geometry is portrait, in mils (thousandths of an inch).

use std::collections::HashMap;
use std::sync::LazyLock;

macro_rules! media_sizes {
    ($($variant:ident => $id:literal, $width:literal x $height:literal;)+) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum MediaSize {
            $($variant,)+
        }

        impl MediaSize {
            pub const ALL: &'static [MediaSize] = &[$(MediaSize::$variant,)+];

            /// Identifier accepted by [`resolve`].
            pub fn id(&self) -> &'static str {
                match self {
                    $(MediaSize::$variant => $id,)+
                }
            }

            pub fn width_mils(&self) -> u32 {
                match self {
                    $(MediaSize::$variant => $width,)+
                }
            }

            pub fn height_mils(&self) -> u32 {
                match self {
                    $(MediaSize::$variant => $height,)+
                }
            }
        }
    };
}

media_sizes! {
    IsoA0 => "ISO_A0", 33110 x 46810;
    IsoA1 => "ISO_A1", 23390 x 33110;
    IsoA2 => "ISO_A2", 16540 x 23390;
    IsoA3 => "ISO_A3", 11690 x 16540;
    IsoA4 => "ISO_A4", 8270 x 11690;
    IsoA5 => "ISO_A5", 5830 x 8270;
    IsoA6 => "ISO_A6", 4130 x 5830;
    IsoA7 => "ISO_A7", 2910 x 4130;
    IsoA8 => "ISO_A8", 2050 x 2910;
    IsoA9 => "ISO_A9", 1460 x 2050;
    IsoA10 => "ISO_A10", 1020 x 1460;
    IsoB0 => "ISO_B0", 39370 x 55670;
    IsoB1 => "ISO_B1", 27830 x 39370;
    IsoB2 => "ISO_B2", 19690 x 27830;
    IsoB3 => "ISO_B3", 13900 x 19690;
    IsoB4 => "ISO_B4", 9840 x 13900;
    IsoB5 => "ISO_B5", 6930 x 9840;
    IsoB6 => "ISO_B6", 4920 x 6930;
    IsoB7 => "ISO_B7", 3460 x 4920;
    IsoB8 => "ISO_B8", 2440 x 3460;
    IsoB9 => "ISO_B9", 1730 x 2440;
    IsoB10 => "ISO_B10", 1220 x 1730;
    IsoC0 => "ISO_C0", 36100 x 51060;
    IsoC1 => "ISO_C1", 25510 x 36100;
    IsoC2 => "ISO_C2", 18030 x 25510;
    IsoC3 => "ISO_C3", 12760 x 18030;
    IsoC4 => "ISO_C4", 9020 x 12760;
    IsoC5 => "ISO_C5", 6380 x 9020;
    IsoC6 => "ISO_C6", 4490 x 6380;
    IsoC7 => "ISO_C7", 3190 x 4490;
    IsoC8 => "ISO_C8", 2240 x 3190;
    IsoC9 => "ISO_C9", 1570 x 2240;
    IsoC10 => "ISO_C10", 1100 x 1570;
    JisB0 => "JIS_B0", 40551 x 57323;
    JisB1 => "JIS_B1", 28661 x 40551;
    JisB2 => "JIS_B2", 20276 x 28661;
    JisB3 => "JIS_B3", 14331 x 20276;
    JisB4 => "JIS_B4", 10118 x 14331;
    JisB5 => "JIS_B5", 7165 x 10118;
    JisB6 => "JIS_B6", 5049 x 7165;
    JisB7 => "JIS_B7", 3583 x 5049;
    JisB8 => "JIS_B8", 2520 x 3583;
    JisB9 => "JIS_B9", 1772 x 2520;
    JisB10 => "JIS_B10", 1259 x 1772;
    JisExec => "JIS_EXEC", 8504 x 12992;
    JpnChou2 => "JPN_CHOU2", 4374 x 5748;
    JpnChou3 => "JPN_CHOU3", 4724 x 9252;
    JpnChou4 => "JPN_CHOU4", 3543 x 8071;
    JpnHagaki => "JPN_HAGAKI", 3937 x 5827;
    JpnKahu => "JPN_KAHU", 9449 x 12681;
    JpnKaku2 => "JPN_KAKU2", 9449 x 13071;
    JpnOufuku => "JPN_OUFUKU", 5827 x 7874;
    JpnYou4 => "JPN_YOU4", 4134 x 9252;
    NaFoolscap => "NA_FOOLSCAP", 8000 x 13000;
    NaGovtLetter => "NA_GOVT_LETTER", 8000 x 10500;
    NaIndex3x5 => "NA_INDEX_3X5", 3000 x 5000;
    NaIndex4x6 => "NA_INDEX_4X6", 4000 x 6000;
    NaIndex5x8 => "NA_INDEX_5X8", 5000 x 8000;
    NaJuniorLegal => "NA_JUNIOR_LEGAL", 8000 x 5000;
    NaLedger => "NA_LEDGER", 17000 x 11000;
    NaLegal => "NA_LEGAL", 8500 x 14000;
    NaLetter => "NA_LETTER", 8500 x 11000;
    NaMonarch => "NA_MONARCH", 7250 x 10500;
    NaQuarto => "NA_QUARTO", 8000 x 10000;
    NaTabloid => "NA_TABLOID", 11000 x 17000;
    OmDaiPaKai => "OM_DAI_PA_KAI", 10827 x 15551;
    OmJuuroKuKai => "OM_JUURO_KU_KAI", 7796 x 10827;
    OmPaKai => "OM_PA_KAI", 10512 x 15315;
    Prc1 => "PRC_1", 4015 x 6496;
    Prc10 => "PRC_10", 12756 x 18032;
    Prc16K => "PRC_16K", 5749 x 8465;
    Prc2 => "PRC_2", 4015 x 6929;
    Prc3 => "PRC_3", 4921 x 6929;
    Prc4 => "PRC_4", 4330 x 8189;
    Prc5 => "PRC_5", 4330 x 8661;
    Prc6 => "PRC_6", 4724 x 12599;
    Prc7 => "PRC_7", 6299 x 9055;
    Prc8 => "PRC_8", 4724 x 12165;
    Prc9 => "PRC_9", 9016 x 12756;
    Roc16K => "ROC_16K", 7677 x 10629;
    Roc8K => "ROC_8K", 10629 x 15354;
}

impl MediaSize {
    /// Used whenever the caller names no size or an unknown one.
    pub const DEFAULT: MediaSize = MediaSize::NaGovtLetter;

    pub fn width_inches(&self) -> f64 {
        f64::from(self.width_mils()) / 1000.0
    }

    pub fn height_inches(&self) -> f64 {
        f64::from(self.height_mils()) / 1000.0
    }
}

impl Default for MediaSize {
    fn default() -> Self {
        MediaSize::DEFAULT
    }
}

static BY_ID: LazyLock<HashMap<&'static str, MediaSize>> =
    LazyLock::new(|| MediaSize::ALL.iter().map(|size| (size.id(), *size)).collect());

/// Resolve a page-size identifier. Matching is exact and case-sensitive;
/// anything else yields [`MediaSize::DEFAULT`].
pub fn resolve(id: Option<&str>) -> MediaSize {
    id.and_then(|id| BY_ID.get(id).copied())
        .unwrap_or(MediaSize::DEFAULT)
}
