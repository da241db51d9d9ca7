//! California county FIPS codes.
//!
//! NOAA climdiv county files identify counties by the three-digit county FIPS
//! code only; this table maps them to the county names used everywhere else.

const CA_COUNTY_FIPS: [(&str, &str); 58] = [
    ("001", "Alameda"),
    ("003", "Alpine"),
    ("005", "Amador"),
    ("007", "Butte"),
    ("009", "Calaveras"),
    ("011", "Colusa"),
    ("013", "Contra Costa"),
    ("015", "Del Norte"),
    ("017", "El Dorado"),
    ("019", "Fresno"),
    ("021", "Glenn"),
    ("023", "Humboldt"),
    ("025", "Imperial"),
    ("027", "Inyo"),
    ("029", "Kern"),
    ("031", "Kings"),
    ("033", "Lake"),
    ("035", "Lassen"),
    ("037", "Los Angeles"),
    ("039", "Madera"),
    ("041", "Marin"),
    ("043", "Mariposa"),
    ("045", "Mendocino"),
    ("047", "Merced"),
    ("049", "Modoc"),
    ("051", "Mono"),
    ("053", "Monterey"),
    ("055", "Napa"),
    ("057", "Nevada"),
    ("059", "Orange"),
    ("061", "Placer"),
    ("063", "Plumas"),
    ("065", "Riverside"),
    ("067", "Sacramento"),
    ("069", "San Benito"),
    ("071", "San Bernardino"),
    ("073", "San Diego"),
    ("075", "San Francisco"),
    ("077", "San Joaquin"),
    ("079", "San Luis Obispo"),
    ("081", "San Mateo"),
    ("083", "Santa Barbara"),
    ("085", "Santa Clara"),
    ("087", "Santa Cruz"),
    ("089", "Shasta"),
    ("091", "Sierra"),
    ("093", "Siskiyou"),
    ("095", "Solano"),
    ("097", "Sonoma"),
    ("099", "Stanislaus"),
    ("101", "Sutter"),
    ("103", "Tehama"),
    ("105", "Trinity"),
    ("107", "Tulare"),
    ("109", "Tuolumne"),
    ("111", "Ventura"),
    ("113", "Yolo"),
    ("115", "Yuba"),
];

/// County name for a FIPS code. Leading zeros may be omitted (`"1"` → Alameda).
pub fn county_name(fips: &str) -> Option<&'static str> {
    let code: u16 = fips.trim().parse().ok()?;
    let padded = format!("{code:03}");
    CA_COUNTY_FIPS
        .iter()
        .find(|(f, _)| *f == padded)
        .map(|(_, name)| *name)
}

/// All county names in FIPS order.
pub fn county_names() -> impl Iterator<Item = &'static str> {
    CA_COUNTY_FIPS.iter().map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_pads_codes() {
        assert_eq!(county_name("001"), Some("Alameda"));
        assert_eq!(county_name("25"), Some("Imperial"));
        assert_eq!(county_name(" 115 "), Some("Yuba"));
        assert_eq!(county_name("002"), None);
        assert_eq!(county_name("abc"), None);
    }

    #[test]
    fn table_has_every_county() {
        assert_eq!(county_names().count(), 58);
    }
}
