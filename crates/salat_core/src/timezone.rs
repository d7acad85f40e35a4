//! crates/salat_core/src/timezone.rs
//!
//! Static region lookup from coordinates to an IANA zone name.
//! The table is scanned in order and the first box containing the point wins,
//! so narrower regions are listed before the wider ones they overlap.

use crate::domain::Location;
use crate::ports::TimezoneResolver;

/// An axis-aligned latitude/longitude box mapped to one zone.
#[derive(Debug, Clone, Copy)]
pub struct RegionBox {
    pub zone: &'static str,
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl RegionBox {
    const fn new(zone: &'static str, lat: (f64, f64), lon: (f64, f64)) -> Self {
        Self {
            zone,
            min_lat: lat.0,
            max_lat: lat.1,
            min_lon: lon.0,
            max_lon: lon.1,
        }
    }

    pub fn contains(&self, location: Location) -> bool {
        (self.min_lat..=self.max_lat).contains(&location.latitude)
            && (self.min_lon..=self.max_lon).contains(&location.longitude)
    }
}

pub const REGIONS: &[RegionBox] = &[
    // Caucasus and Middle East
    RegionBox::new("Asia/Qatar", (24.4, 26.2), (50.7, 51.7)),
    RegionBox::new("Asia/Dubai", (22.5, 26.3), (51.7, 56.4)),
    RegionBox::new("Asia/Baku", (38.3, 42.0), (44.7, 50.6)),
    RegionBox::new("Asia/Yerevan", (38.8, 41.3), (43.4, 46.6)),
    RegionBox::new("Asia/Tbilisi", (41.0, 43.6), (40.0, 46.7)),
    RegionBox::new("Europe/Istanbul", (35.8, 42.2), (26.0, 44.8)),
    RegionBox::new("Asia/Amman", (29.2, 33.4), (35.5, 39.3)),
    RegionBox::new("Asia/Damascus", (32.3, 37.3), (35.7, 41.0)),
    RegionBox::new("Asia/Baghdad", (29.1, 37.4), (38.8, 46.0)),
    RegionBox::new("Asia/Baghdad", (29.1, 31.5), (46.0, 48.6)),
    RegionBox::new("Asia/Riyadh", (16.0, 32.2), (34.5, 55.7)),
    RegionBox::new("Africa/Cairo", (22.0, 31.7), (24.7, 34.5)),
    RegionBox::new("Asia/Tehran", (25.0, 39.8), (44.0, 63.3)),
    // Russia
    RegionBox::new("Europe/Kaliningrad", (54.3, 55.4), (19.6, 22.9)),
    RegionBox::new("Europe/Samara", (52.0, 54.7), (49.0, 52.5)),
    RegionBox::new("Asia/Yekaterinburg", (51.0, 70.0), (53.0, 66.0)),
    RegionBox::new("Europe/Moscow", (41.2, 70.0), (27.0, 50.0)),
    // Siberia and the Far East
    RegionBox::new("Asia/Omsk", (53.4, 59.0), (66.0, 76.0)),
    RegionBox::new("Asia/Novosibirsk", (53.0, 59.0), (76.0, 86.0)),
    // Central Asia
    RegionBox::new("Asia/Tashkent", (37.1, 45.6), (56.0, 73.2)),
    RegionBox::new("Asia/Almaty", (40.5, 55.4), (66.0, 87.4)),
    RegionBox::new("Asia/Krasnoyarsk", (51.0, 77.0), (86.0, 106.0)),
    RegionBox::new("Asia/Irkutsk", (50.0, 60.0), (106.0, 119.0)),
    RegionBox::new("Asia/Yakutsk", (55.0, 72.0), (119.0, 135.0)),
    RegionBox::new("Asia/Vladivostok", (42.0, 55.0), (130.0, 141.0)),
    // South and South-East Asia
    RegionBox::new("Asia/Karachi", (23.6, 37.1), (60.8, 77.8)),
    RegionBox::new("Asia/Kolkata", (6.5, 35.5), (68.0, 97.5)),
    RegionBox::new("Asia/Kuala_Lumpur", (1.2, 6.8), (99.6, 104.5)),
    RegionBox::new("Asia/Jakarta", (-11.0, 6.0), (95.0, 115.0)),
    // Europe
    RegionBox::new("Europe/London", (49.9, 60.9), (-8.2, 1.8)),
    RegionBox::new("Europe/Paris", (42.3, 51.1), (-4.8, 8.2)),
    RegionBox::new("Europe/Berlin", (47.2, 55.1), (8.2, 15.1)),
    // North America
    RegionBox::new("America/New_York", (24.5, 47.5), (-84.0, -66.9)),
    RegionBox::new("America/Chicago", (25.8, 49.0), (-104.0, -84.0)),
    RegionBox::new("America/Denver", (31.0, 49.0), (-114.0, -104.0)),
    RegionBox::new("America/Los_Angeles", (32.5, 49.0), (-124.8, -114.0)),
];

/// Resolves via [`REGIONS`], falling back to a whole-hour offset from longitude.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticTimezoneResolver;

impl TimezoneResolver for StaticTimezoneResolver {
    fn resolve(&self, location: Location) -> String {
        REGIONS
            .iter()
            .find(|region| region.contains(location))
            .map(|region| region.zone.to_string())
            .unwrap_or_else(|| offset_zone(location.longitude))
    }
}

/// `Etc/GMT±N` for the nearest whole-hour offset. The Etc sign is inverted:
/// UTC+3 is `Etc/GMT-3`.
pub fn offset_zone(longitude: f64) -> String {
    let hours = if longitude.is_finite() {
        (longitude / 15.0).round().clamp(-12.0, 12.0) as i32
    } else {
        0
    };
    match hours {
        0 => "Etc/GMT".to_string(),
        h if h > 0 => format!("Etc/GMT-{}", h),
        h => format!("Etc/GMT+{}", -h),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::parse_timezone;

    fn resolve(lat: f64, lon: f64) -> String {
        StaticTimezoneResolver.resolve(Location::new(lat, lon))
    }

    #[test]
    fn known_cities() {
        assert_eq!(resolve(55.7558, 37.6173), "Europe/Moscow");
        assert_eq!(resolve(53.1959, 50.1002), "Europe/Samara");
        assert_eq!(resolve(55.7963, 49.1088), "Europe/Moscow");
        assert_eq!(resolve(41.0082, 28.9784), "Europe/Istanbul");
        assert_eq!(resolve(21.4225, 39.8262), "Asia/Riyadh");
        assert_eq!(resolve(25.2048, 55.2708), "Asia/Dubai");
        assert_eq!(resolve(56.8389, 60.6057), "Asia/Yekaterinburg");
        assert_eq!(resolve(43.1155, 131.8855), "Asia/Vladivostok");
        assert_eq!(resolve(54.9885, 73.3242), "Asia/Omsk");
        assert_eq!(resolve(55.0084, 82.9357), "Asia/Novosibirsk");
        assert_eq!(resolve(43.2220, 76.8512), "Asia/Almaty");
        assert_eq!(resolve(41.2995, 69.2401), "Asia/Tashkent");
        assert_eq!(resolve(33.3152, 44.3661), "Asia/Baghdad");
        assert_eq!(resolve(30.5085, 47.7804), "Asia/Baghdad");
        assert_eq!(resolve(31.9539, 35.9106), "Asia/Amman");
        assert_eq!(resolve(33.5138, 36.2765), "Asia/Damascus");
        assert_eq!(resolve(35.6892, 51.3890), "Asia/Tehran");
    }

    #[test]
    fn narrower_boxes_precede_the_boxes_they_overlap() {
        for (i, later) in REGIONS.iter().enumerate() {
            for earlier in &REGIONS[..i] {
                let inside = earlier.min_lat >= later.min_lat
                    && earlier.max_lat <= later.max_lat
                    && earlier.min_lon >= later.min_lon
                    && earlier.max_lon <= later.max_lon;
                let shadowed = later.min_lat >= earlier.min_lat
                    && later.max_lat <= earlier.max_lat
                    && later.min_lon >= earlier.min_lon
                    && later.max_lon <= earlier.max_lon;
                assert!(
                    inside || !shadowed,
                    "{} is unreachable behind {}",
                    later.zone,
                    earlier.zone
                );
            }
        }
    }

    #[test]
    fn falls_back_to_longitude_offset() {
        // Middle of the Pacific.
        assert_eq!(resolve(-20.0, -150.0), "Etc/GMT+10");
        assert_eq!(resolve(-40.0, 2.0), "Etc/GMT");
        assert_eq!(resolve(-45.0, 170.0), "Etc/GMT-11");
        assert_eq!(offset_zone(f64::NAN), "Etc/GMT");
    }

    #[test]
    fn every_zone_parses() {
        for region in REGIONS {
            assert!(parse_timezone(region.zone).is_ok(), "{}", region.zone);
        }
        for lon in (-180..=180).step_by(15) {
            let zone = offset_zone(lon as f64);
            assert!(parse_timezone(&zone).is_ok(), "{}", zone);
        }
    }
}
