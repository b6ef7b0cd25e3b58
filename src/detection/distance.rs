use super::types::LocationFix;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two fixes using the haversine formula.
pub fn haversine_meters(from: &LocationFix, to: &LocationFix) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lon = (to.lon - from.lon).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

pub fn meters_to_miles(meters: f64, meters_per_mile: f64) -> f64 {
    meters / meters_per_mile
}

/// Total length of an ordered fix sequence, in miles.
pub fn path_miles(fixes: &[LocationFix], meters_per_mile: f64) -> f64 {
    fixes
        .windows(2)
        .map(|pair| meters_to_miles(haversine_meters(&pair[0], &pair[1]), meters_per_mile))
        .sum()
}
