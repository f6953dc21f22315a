//! Reference vocabulary of Formula 1 names.
//!
//! Entity extraction at query time and entity tagging at ingestion time both
//! read from these lists, so a name added here is picked up on both sides.
//! Bump [`VOCABULARY_VERSION`] whenever a list changes; documents tagged under
//! an older version may miss entities until they are re-seeded.

/// Version of the name lists below
pub const VOCABULARY_VERSION: &str = "2025.1";

/// Driver surnames, current grid first
pub const DRIVERS: &[&str] = &[
    "Verstappen",
    "Hamilton",
    "Leclerc",
    "Norris",
    "Sainz",
    "Russell",
    "Piastri",
    "Perez",
    "Alonso",
    "Stroll",
    "Ocon",
    "Gasly",
    "Bottas",
    "Zhou",
    "Magnussen",
    "Hulkenberg",
    "Albon",
    "Tsunoda",
    "Ricciardo",
    "Colapinto",
    "Lawson",
    "Antonelli",
    "Bearman",
    "Doohan",
];

/// Constructor names as commonly written in press coverage
pub const TEAMS: &[&str] = &[
    "Red Bull",
    "Ferrari",
    "Mercedes",
    "McLaren",
    "Aston Martin",
    "Alpine",
    "Williams",
    "Sauber",
    "Racing Bulls",
    "RB",
    "Haas",
];

pub const CIRCUITS: &[&str] = &[
    "Monaco",
    "Silverstone",
    "Spa",
    "Monza",
    "Suzuka",
    "Singapore",
    "Bahrain",
    "Jeddah",
    "Melbourne",
    "Miami",
    "Imola",
    "Barcelona",
];

/// Which list a canonical name belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Driver,
    Team,
    Circuit,
}

/// Every canonical name with its kind, drivers then teams then circuits
#[inline]
pub fn canonical_names() -> impl Iterator<Item = (EntityKind, &'static str)> {
    DRIVERS
        .iter()
        .map(|name| (EntityKind::Driver, *name))
        .chain(TEAMS.iter().map(|name| (EntityKind::Team, *name)))
        .chain(CIRCUITS.iter().map(|name| (EntityKind::Circuit, *name)))
}

/// Look up the kind of a canonical name, ignoring case
#[inline]
pub fn kind_of(name: &str) -> Option<EntityKind> {
    canonical_names()
        .find(|(_, canonical)| canonical.eq_ignore_ascii_case(name))
        .map(|(kind, _)| kind)
}
