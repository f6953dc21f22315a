use chrono::NaiveDate;

use super::{Document, DocumentMetadata, DocumentType};

const FACTS_SOURCE: &str = "compiled";

struct Fact {
    title: &'static str,
    body: &'static str,
    entities: &'static [&'static str],
}

const FACTS: &[Fact] = &[
    Fact {
        title: "Formula 1 World Champions History",
        body: "A complete history of Formula 1 World Drivers' Champions:

Recent Champions:
- 2024: Max Verstappen (Red Bull Racing) - 4th title
- 2023: Max Verstappen (Red Bull Racing) - 3rd title
- 2022: Max Verstappen (Red Bull Racing) - 2nd title
- 2021: Max Verstappen (Red Bull Racing) - 1st title
- 2020: Lewis Hamilton (Mercedes) - 7th title
- 2019: Lewis Hamilton (Mercedes) - 6th title
- 2018: Lewis Hamilton (Mercedes) - 5th title
- 2017: Lewis Hamilton (Mercedes) - 4th title

Most Successful Drivers by Championships:
1. Michael Schumacher & Lewis Hamilton: 7 titles each
2. Juan Manuel Fangio: 5 titles
3. Max Verstappen & Alain Prost & Sebastian Vettel: 4 titles each

The World Championship has been contested since 1950, making it one of the oldest motorsport championships in the world.",
        entities: &[
            "Verstappen",
            "Hamilton",
            "Schumacher",
            "Vettel",
            "Red Bull",
            "Mercedes",
        ],
    },
    Fact {
        title: "Formula 1 Race Records",
        body: "Notable Formula 1 race records and statistics:

Most Race Wins:
1. Lewis Hamilton: 103 wins
2. Michael Schumacher: 91 wins
3. Max Verstappen: 60+ wins (ongoing)
4. Sebastian Vettel: 53 wins
5. Alain Prost: 51 wins

Most Pole Positions:
1. Lewis Hamilton: 104 poles
2. Michael Schumacher: 68 poles
3. Ayrton Senna: 65 poles

Most Consecutive Wins:
- Max Verstappen: 10 consecutive wins (2023)
- Sebastian Vettel: 9 consecutive wins (2013)

Youngest World Champion:
- Sebastian Vettel: 23 years, 134 days (2010)

Oldest World Champion:
- Juan Manuel Fangio: 46 years, 41 days (1957)

Most races without a win before first victory:
- Mark Webber: 130 races",
        entities: &[
            "Hamilton",
            "Schumacher",
            "Verstappen",
            "Vettel",
            "Senna",
            "Prost",
        ],
    },
    Fact {
        title: "F1 Technical Regulations Overview",
        body: "Formula 1 technical regulations govern car design and performance:

Current Regulations (2022-2025):
- Ground effect aerodynamics for closer racing
- 18-inch wheels (up from 13-inch)
- Simplified front and rear wings
- E10 fuel (10% sustainable ethanol)
- Budget cap: $135 million (2024)

Power Unit Specifications:
- 1.6L V6 turbocharged hybrid engine
- MGU-K (Kinetic): 120kW recovery
- MGU-H (Heat): Unlimited recovery
- Energy Store: 4MJ per lap
- Total power output: ~1000 HP

Weight Regulations:
- Minimum car weight: 798 kg (including driver)
- Minimum driver weight: 80 kg (with seat and equipment)

2026 Regulations Preview:
- New power unit: More electrical power
- Removal of MGU-H
- Active aerodynamics
- Sustainable fuels
- Revised budget cap",
        entities: &["F1", "regulations", "power unit", "hybrid"],
    },
];

/// Curated historical documents seeded alongside scraped data.
///
/// Entities are hand-picked here rather than extracted, since they name
/// retired champions outside the current vocabulary.
#[inline]
pub fn historical_facts(date: NaiveDate) -> Vec<Document> {
    FACTS
        .iter()
        .map(|fact| {
            let metadata = DocumentMetadata::new(FACTS_SOURCE, DocumentType::Historical, date)
                .with_title(fact.title)
                .with_entities(fact.entities.iter().copied());
            Document::new(format!("{}\n\n{}", fact.title, fact.body), metadata)
        })
        .collect()
}
