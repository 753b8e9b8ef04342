// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Channel value types and the IEEE Std 802.11-2016 Annex E channelization
//! math used to derive secondary channels and VHT frequency-segment centers.

use {anyhow::format_err, std::fmt};

pub type MHz = u16;
pub const BASE_FREQ_2GHZ: MHz = 2407;
pub const BASE_FREQ_5GHZ: MHz = 5000;

/// Channel number 0 is never a real channel. Explicit channel lists use it as
/// a padding sentinel, and notification payloads use it for "not applicable".
pub const INVALID_CHAN_IDX: u8 = 0;

/// Channel bandwidth. Cbw80P80 carries the channel index corresponding to the
/// center frequency of the secondary (non-consecutive) 80 MHz segment.
#[derive(Clone, Copy, Debug, Ord, PartialOrd, Eq, PartialEq)]
pub enum Cbw {
    Cbw20,
    Cbw40, // Same as Cbw40Above
    Cbw40Below,
    Cbw80,
    Cbw160,
    Cbw80P80 { secondary80: u8 },
}

impl Cbw {
    /// True for bandwidths that only exist with VHT channelization, i.e. that
    /// have no 2.4 GHz representation.
    pub fn is_vht_only(&self) -> bool {
        matches!(self, Cbw::Cbw80 | Cbw::Cbw160 | Cbw::Cbw80P80 { .. })
    }
}

/// Regulatory classification of a channel, as reported by the regulatory
/// collaborator for the current domain.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RegulatoryClass {
    NonDfs,
    Dfs,
    Disabled,
}

/// Current usability of a channel for selection purposes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChannelAvailability {
    Available,
    /// Barred after radar detection, until the non-occupancy period lapses.
    NonOccupancy,
    /// A clear-channel assessment is currently running on this channel.
    UnderAssessment,
}

/// A Channel defines the frequency spectrum an AP instance beacons on.
#[derive(Clone, Copy, Debug, Ord, PartialOrd, Eq, PartialEq)]
pub struct Channel {
    pub primary: u8,
    pub cbw: Cbw,
}

// Short CBW notation carried over from the SME: "+"/"-" for the 40 MHz
// secondary position, "V" for 80 MHz, "W" for 160 MHz.
impl fmt::Display for Cbw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cbw::Cbw20 => write!(f, ""),
            Cbw::Cbw40 => write!(f, "+"),
            Cbw::Cbw40Below => write!(f, "-"),
            Cbw::Cbw80 => write!(f, "V"),
            Cbw::Cbw160 => write!(f, "W"),
            Cbw::Cbw80P80 { secondary80 } => write!(f, "+{}P", secondary80),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.primary, self.cbw)
    }
}

impl Channel {
    pub fn new(primary: u8, cbw: Cbw) -> Self {
        Channel { primary, cbw }
    }

    // Weak validity test w.r.t. the 2.4 GHz band primary channel only.
    // Channels 12-14 exist but are region-restricted; the catalog decides
    // whether they are usable, not this type.
    fn is_primary_2ghz(&self) -> bool {
        let p = self.primary;
        p >= 1 && p <= 14
    }

    // Weak validity test w.r.t. the 5 GHz band primary channel only.
    fn is_primary_5ghz(&self) -> bool {
        let p = self.primary;
        match p {
            36..=64 => (p - 36) % 4 == 0,
            100..=144 => (p - 100) % 4 == 0,
            149..=165 => (p - 149) % 4 == 0,
            _ => false,
        }
    }

    fn is_primary_valid(&self) -> bool {
        self.is_primary_2ghz() || self.is_primary_5ghz()
    }

    pub fn is_2ghz(&self) -> bool {
        self.is_primary_2ghz()
    }

    pub fn is_5ghz(&self) -> bool {
        self.is_primary_5ghz()
    }

    fn get_band_start_freq(&self) -> Result<MHz, anyhow::Error> {
        if self.is_primary_2ghz() {
            Ok(BASE_FREQ_2GHZ)
        } else if self.is_primary_5ghz() {
            Ok(BASE_FREQ_5GHZ)
        } else {
            Err(format_err!("cannot get band start freq for channel {}", self))
        }
    }

    // Note get_center_chan_idx() is to assist channel validity tests and
    // VHT segment derivation. Ok() does not imply the channel is valid.
    fn get_center_chan_idx(&self) -> Result<u8, anyhow::Error> {
        if !self.is_primary_valid() {
            return Err(format_err!(
                "cannot get center channel index for an invalid primary channel {}",
                self
            ));
        }

        let p = self.primary;
        match self.cbw {
            Cbw::Cbw20 => Ok(p),
            Cbw::Cbw40 => Ok(p + 2),
            Cbw::Cbw40Below => Ok(p - 2),
            Cbw::Cbw80 | Cbw::Cbw80P80 { .. } => match p {
                36..=48 => Ok(42),
                52..=64 => Ok(58),
                100..=112 => Ok(106),
                116..=128 => Ok(122),
                132..=144 => Ok(138),
                148..=161 => Ok(155),
                _ => Err(format_err!("cannot get center channel index for invalid channel {}", self)),
            },
            Cbw::Cbw160 => {
                // See IEEE Std 802.11-2016 Tables 9-252 and 9-253. CBW160 has
                // a single frequency segment.
                match p {
                    36..=64 => Ok(50),
                    100..=128 => Ok(114),
                    _ => Err(format_err!(
                        "cannot get center channel index for invalid channel {}",
                        self
                    )),
                }
            }
        }
    }

    /// Returns the center frequency of the first consecutive frequency
    /// segment of the channel in MHz, or an error for an invalid channel.
    pub fn get_center_freq(&self) -> Result<MHz, anyhow::Error> {
        // IEEE Std 802.11-2016, 21.3.14
        let start_freq = self.get_band_start_freq()?;
        let center_chan_idx = self.get_center_chan_idx()?;
        let spacing: MHz = 5;
        Ok(start_freq + spacing * center_chan_idx as u16)
    }

    /// The 20 MHz secondary channel number, or `INVALID_CHAN_IDX` for plain
    /// 20 MHz operation. For 80 MHz and wider the secondary is determined by
    /// the primary's position within its 40 MHz pair.
    pub fn secondary_channel(&self) -> u8 {
        let p = self.primary;
        match self.cbw {
            Cbw::Cbw20 => INVALID_CHAN_IDX,
            Cbw::Cbw40 => p + 4,
            Cbw::Cbw40Below => p.saturating_sub(4),
            Cbw::Cbw80 | Cbw::Cbw160 | Cbw::Cbw80P80 { .. } => {
                if self.is_primary_2ghz() {
                    // No VHT channelization exists in the 2.4 GHz band.
                    return INVALID_CHAN_IDX;
                }
                // 5 GHz 40 MHz pairing: the lower member of each pair has
                // p % 8 == 4 (36..144) or p % 8 == 5 (149..161).
                let lower = (p % 8) == (if p <= 144 { 4 } else { 5 });
                if lower {
                    p + 4
                } else {
                    p.saturating_sub(4)
                }
            }
        }
    }

    /// The two VHT frequency-segment center channel indices (CCFS0, CCFS1)
    /// for the notification payload; `INVALID_CHAN_IDX` where not applicable.
    pub fn vht_segments(&self) -> (u8, u8) {
        match self.cbw {
            Cbw::Cbw20 | Cbw::Cbw40 | Cbw::Cbw40Below => (INVALID_CHAN_IDX, INVALID_CHAN_IDX),
            Cbw::Cbw80 | Cbw::Cbw160 => {
                (self.get_center_chan_idx().unwrap_or(INVALID_CHAN_IDX), INVALID_CHAN_IDX)
            }
            Cbw::Cbw80P80 { secondary80 } => {
                (self.get_center_chan_idx().unwrap_or(INVALID_CHAN_IDX), secondary80)
            }
        }
    }

    /// Returns true if the primary channel index, bandwidth, and secondary
    /// frequency segment (Cbw80P80 only) are mutually consistent.
    pub fn is_valid(&self) -> bool {
        if self.is_primary_2ghz() {
            self.is_valid_2ghz()
        } else if self.is_primary_5ghz() {
            self.is_valid_5ghz()
        } else {
            false
        }
    }

    fn is_valid_2ghz(&self) -> bool {
        if !self.is_primary_2ghz() {
            return false;
        }
        let p = self.primary;
        match self.cbw {
            Cbw::Cbw20 => true,
            Cbw::Cbw40 => p <= 7,
            Cbw::Cbw40Below => p >= 5,
            _ => false,
        }
    }

    fn is_valid_5ghz(&self) -> bool {
        if !self.is_primary_5ghz() {
            return false;
        }
        let p = self.primary;
        match self.cbw {
            Cbw::Cbw20 => true,
            Cbw::Cbw40 => p != 165 && (p % 8) == (if p <= 144 { 4 } else { 5 }),
            Cbw::Cbw40Below => p != 165 && (p % 8) == (if p <= 144 { 0 } else { 1 }),
            Cbw::Cbw80 => p != 165,
            Cbw::Cbw160 => p < 132,
            Cbw::Cbw80P80 { secondary80 } => {
                if p == 165 {
                    return false;
                }
                let valid_secondary80: [u8; 6] = [42, 58, 106, 122, 138, 155];
                if !valid_secondary80.contains(&secondary80) {
                    return false;
                }
                let ccfs0 = match self.get_center_chan_idx() {
                    Ok(v) => v,
                    Err(_) => return false,
                };
                let ccfs1 = secondary80;
                let gap = (ccfs0 as i16 - ccfs1 as i16).abs();
                gap > 16
            }
        }
    }

    fn is_unii2a(&self) -> bool {
        let p = self.primary;
        p >= 50 && p <= 68
    }

    fn is_unii2c(&self) -> bool {
        let p = self.primary;
        p >= 96 && p <= 144
    }

    /// True for channels in the U-NII-2A / U-NII-2C ranges, which require
    /// radar detection (CAC before use, ongoing monitoring).
    pub fn is_dfs(&self) -> bool {
        self.is_unii2a() || self.is_unii2c()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_display() {
        let mut c = Channel::new(100, Cbw::Cbw40);
        assert_eq!(format!("{}", c), "100+");
        c.cbw = Cbw::Cbw160;
        assert_eq!(format!("{}", c), "100W");
        c.cbw = Cbw::Cbw80P80 { secondary80: 200 };
        assert_eq!(format!("{}", c), "100+200P");
    }

    #[test]
    fn primary_validity() {
        assert!(Channel::new(1, Cbw::Cbw20).is_primary_valid());
        assert!(Channel::new(14, Cbw::Cbw20).is_primary_valid());
        assert!(!Channel::new(15, Cbw::Cbw20).is_primary_valid());
        assert!(Channel::new(36, Cbw::Cbw20).is_primary_valid());
        assert!(!Channel::new(37, Cbw::Cbw20).is_primary_valid());
        assert!(Channel::new(165, Cbw::Cbw20).is_primary_valid());
        assert!(!Channel::new(166, Cbw::Cbw20).is_primary_valid());

        assert!(Channel::new(1, Cbw::Cbw20).is_2ghz());
        assert!(!Channel::new(1, Cbw::Cbw20).is_5ghz());
        assert!(!Channel::new(36, Cbw::Cbw20).is_2ghz());
        assert!(Channel::new(36, Cbw::Cbw20).is_5ghz());
    }

    #[test]
    fn band_start_freq() {
        assert_eq!(BASE_FREQ_2GHZ, Channel::new(1, Cbw::Cbw20).get_band_start_freq().unwrap());
        assert_eq!(BASE_FREQ_5GHZ, Channel::new(100, Cbw::Cbw20).get_band_start_freq().unwrap());
        assert!(Channel::new(15, Cbw::Cbw20).get_band_start_freq().is_err());
        assert!(Channel::new(200, Cbw::Cbw20).get_band_start_freq().is_err());
    }

    #[test]
    fn center_chan_idx() {
        assert!(Channel::new(1, Cbw::Cbw80).get_center_chan_idx().is_err());
        assert_eq!(9, Channel::new(11, Cbw::Cbw40Below).get_center_chan_idx().unwrap());
        assert_eq!(8, Channel::new(6, Cbw::Cbw40).get_center_chan_idx().unwrap());
        assert_eq!(36, Channel::new(36, Cbw::Cbw20).get_center_chan_idx().unwrap());
        assert_eq!(38, Channel::new(36, Cbw::Cbw40).get_center_chan_idx().unwrap());
        assert_eq!(42, Channel::new(36, Cbw::Cbw80).get_center_chan_idx().unwrap());
        assert_eq!(50, Channel::new(36, Cbw::Cbw160).get_center_chan_idx().unwrap());
        assert_eq!(106, Channel::new(104, Cbw::Cbw80).get_center_chan_idx().unwrap());
    }

    #[test]
    fn center_freq() {
        assert_eq!(2412 as MHz, Channel::new(1, Cbw::Cbw20).get_center_freq().unwrap());
        assert_eq!(2437 as MHz, Channel::new(6, Cbw::Cbw20).get_center_freq().unwrap());
        assert_eq!(2447 as MHz, Channel::new(6, Cbw::Cbw40).get_center_freq().unwrap());
        assert_eq!(5180 as MHz, Channel::new(36, Cbw::Cbw20).get_center_freq().unwrap());
        assert_eq!(5190 as MHz, Channel::new(36, Cbw::Cbw40).get_center_freq().unwrap());
        assert_eq!(5210 as MHz, Channel::new(36, Cbw::Cbw80).get_center_freq().unwrap());
    }

    #[test]
    fn secondary_channel_derivation() {
        assert_eq!(0, Channel::new(6, Cbw::Cbw20).secondary_channel());
        assert_eq!(10, Channel::new(6, Cbw::Cbw40).secondary_channel());
        assert_eq!(7, Channel::new(11, Cbw::Cbw40Below).secondary_channel());
        assert_eq!(40, Channel::new(36, Cbw::Cbw40).secondary_channel());
        // Position within the 40 MHz pair decides the direction at >= 80 MHz.
        assert_eq!(40, Channel::new(36, Cbw::Cbw80).secondary_channel());
        assert_eq!(36, Channel::new(40, Cbw::Cbw80).secondary_channel());
        assert_eq!(104, Channel::new(100, Cbw::Cbw80).secondary_channel());
        assert_eq!(100, Channel::new(104, Cbw::Cbw80).secondary_channel());
        assert_eq!(153, Channel::new(149, Cbw::Cbw80).secondary_channel());
    }

    #[test]
    fn vht_segment_derivation() {
        assert_eq!((0, 0), Channel::new(6, Cbw::Cbw40).vht_segments());
        assert_eq!((42, 0), Channel::new(36, Cbw::Cbw80).vht_segments());
        assert_eq!((106, 0), Channel::new(104, Cbw::Cbw80).vht_segments());
        assert_eq!((50, 0), Channel::new(36, Cbw::Cbw160).vht_segments());
        assert_eq!((42, 155), Channel::new(36, Cbw::Cbw80P80 { secondary80: 155 }).vht_segments());
    }

    #[test]
    fn valid_combos() {
        assert!(Channel::new(1, Cbw::Cbw20).is_valid());
        assert!(Channel::new(1, Cbw::Cbw40).is_valid());
        assert!(Channel::new(5, Cbw::Cbw40Below).is_valid());
        assert!(Channel::new(11, Cbw::Cbw40Below).is_valid());
        assert!(Channel::new(36, Cbw::Cbw40).is_valid());
        assert!(Channel::new(36, Cbw::Cbw160).is_valid());
        assert!(Channel::new(40, Cbw::Cbw40Below).is_valid());
        assert!(Channel::new(100, Cbw::Cbw80).is_valid());
    }

    #[test]
    fn invalid_combos() {
        assert!(!Channel::new(1, Cbw::Cbw40Below).is_valid());
        assert!(!Channel::new(8, Cbw::Cbw40).is_valid());
        assert!(!Channel::new(6, Cbw::Cbw80).is_valid());
        assert!(!Channel::new(36, Cbw::Cbw40Below).is_valid());
        assert!(!Channel::new(40, Cbw::Cbw40).is_valid());
        assert!(!Channel::new(165, Cbw::Cbw80).is_valid());
    }

    #[test]
    fn dfs_ranges() {
        assert!(!Channel::new(1, Cbw::Cbw20).is_dfs());
        assert!(!Channel::new(36, Cbw::Cbw20).is_dfs());
        assert!(Channel::new(52, Cbw::Cbw20).is_dfs());
        assert!(Channel::new(100, Cbw::Cbw20).is_dfs());
        assert!(Channel::new(144, Cbw::Cbw20).is_dfs());
        assert!(!Channel::new(149, Cbw::Cbw20).is_dfs());
    }
}
