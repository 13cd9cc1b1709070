//! Perfiles de cada vista (ofertas, candidatos, empresas).
//!
//! Todas las vistas comparten el mismo traductor; lo único que cambia entre
//! ellas vive aquí: colección destino, prompt de sistema, si se envía el
//! historial, temperatura, textos fijos y fichas de ejemplo.

use serde::{Deserialize, Serialize};

use crate::models::{Address, CompanyCard, DisplayCards, JobCard, UserCard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    Job,
    User,
    Company,
}

impl Persona {
    pub const ALL: [Persona; 3] = [Persona::Job, Persona::User, Persona::Company];

    pub fn profile(self) -> PersonaProfile {
        match self {
            Persona::User => PersonaProfile {
                collection: "users",
                system_prompt: USER_PROMPT,
                include_history: false,
                temperature: Some(0.0),
                acknowledgement: "What else can I help you with?",
                fallback_reply: "I apologize, but I was unable to generate a response.",
            },
            Persona::Company => PersonaProfile {
                collection: "companies",
                system_prompt: COMPANY_PROMPT,
                include_history: false,
                temperature: Some(0.0),
                acknowledgement: "Searching companies...",
                fallback_reply: "Unable to generate query",
            },
            Persona::Job => PersonaProfile {
                collection: "jobs",
                system_prompt: JOB_PROMPT,
                include_history: true,
                temperature: Some(0.0),
                acknowledgement: "What else can I help you with?",
                fallback_reply: "I apologize, but I was unable to generate a response.",
            },
        }
    }

    /// Fichas de ejemplo de la vista. Son datos fijos, no resultados.
    pub fn placeholder_cards(self) -> DisplayCards {
        match self {
            Persona::Job => DisplayCards::Jobs(placeholder_jobs()),
            Persona::User => DisplayCards::Users(placeholder_users()),
            Persona::Company => DisplayCards::Companies(placeholder_companies()),
        }
    }
}

/// Configuración del traductor para una vista.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonaProfile {
    pub collection: &'static str,
    pub system_prompt: &'static str,
    pub include_history: bool,
    pub temperature: Option<f64>,
    pub acknowledgement: &'static str,
    pub fallback_reply: &'static str,
}

const USER_PROMPT: &str = "You are a MongoDB query generator. Always respond with a valid MongoDB query in JSON format. Do not include any explanations or additional text.";

const COMPANY_PROMPT: &str = "You are a MongoDB query generator for company search. Respond with valid MongoDB query in JSON format. Use \"companies\" collection. Fields: name, industry, location, description, website, employees.";

const JOB_PROMPT: &str = "You are a MongoDB query generator for job search. Respond only with a MongoDB filter that is strictly valid JSON. Never use raw regular expression literals such as /abc/i; write {\"$regex\": \"abc\", \"$options\": \"i\"} instead. Use \"jobs\" collection. Fields: name, email, mobile, details.address_line_1, details.address_line_2, details.city, details.district, details.state, details.pincode. Do not include any explanations or additional text.";

fn placeholder_users() -> Vec<UserCard> {
    [
        ("Julia Byrne", "Ireland", 4.8, "a.png"),
        ("Baptiste Sotho", "France", 4.5, "b.png"),
        ("Steve Rogers", "UK", 4.7, "c.png"),
        ("Luna Hernandez", "Spain", 4.9, "d.png"),
    ]
    .into_iter()
    .map(|(name, location, ranking, image)| UserCard {
        name: name.to_string(),
        location: location.to_string(),
        role: "Software Engineer".to_string(),
        employment_type: "Full-time".to_string(),
        ranking,
        image: format!("images/{image}"),
    })
    .collect()
}

fn placeholder_companies() -> Vec<CompanyCard> {
    vec![
        CompanyCard {
            id: "1".to_string(),
            name: "Tech Innovators Inc.".to_string(),
            industry: "Information Technology".to_string(),
            location: "San Francisco, CA".to_string(),
            description: "Leading provider of AI-powered solutions for enterprises".to_string(),
            website: "www.techinnovators.com".to_string(),
            employees: "5001-10,000".to_string(),
            logo: "images/c1.png".to_string(),
        },
        CompanyCard {
            id: "2".to_string(),
            name: "Green Energy Corp".to_string(),
            industry: "Renewable Energy".to_string(),
            location: "Austin, TX".to_string(),
            description: "Pioneering sustainable energy solutions".to_string(),
            website: "www.greenenergycorp.com".to_string(),
            employees: "1001-5000".to_string(),
            logo: "images/c2.png".to_string(),
        },
    ]
}

fn placeholder_jobs() -> Vec<JobCard> {
    vec![
        JobCard {
            id: "1".to_string(),
            name: "Backend Engineer".to_string(),
            email: "jobs@techinnovators.com".to_string(),
            mobile: "+1 415 555 0100".to_string(),
            details: Address {
                address_line_1: "500 Howard St".to_string(),
                address_line_2: "Floor 3".to_string(),
                city: "San Francisco".to_string(),
                district: "SoMa".to_string(),
                state: "CA".to_string(),
                pincode: 94105,
            },
        },
        JobCard {
            id: "2".to_string(),
            name: "Data Analyst".to_string(),
            email: "careers@greenenergycorp.com".to_string(),
            mobile: "+1 512 555 0142".to_string(),
            details: Address {
                address_line_1: "200 Congress Ave".to_string(),
                address_line_2: "Suite 12".to_string(),
                city: "Austin".to_string(),
                district: "Downtown".to_string(),
                state: "TX".to_string(),
                pincode: 78701,
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_persona_targets_its_own_collection() {
        let collections: Vec<_> = Persona::ALL.iter().map(|p| p.profile().collection).collect();
        assert_eq!(collections, vec!["jobs", "users", "companies"]);
    }

    #[test]
    fn built_in_profiles_are_deterministic() {
        for persona in Persona::ALL {
            assert_eq!(persona.profile().temperature, Some(0.0));
        }
    }

    #[test]
    fn job_prompt_forbids_regex_literals() {
        assert!(Persona::Job.profile().system_prompt.contains("$regex"));
    }

    #[test]
    fn persona_parses_from_lowercase() {
        let p: Persona = serde_json::from_str("\"company\"").unwrap();
        assert_eq!(p, Persona::Company);
        assert!(serde_json::from_str::<Persona>("\"admin\"").is_err());
    }

    #[test]
    fn placeholder_cards_match_persona() {
        assert!(matches!(Persona::User.placeholder_cards(), DisplayCards::Users(ref u) if u.len() == 4));
        assert!(matches!(Persona::Company.placeholder_cards(), DisplayCards::Companies(ref c) if c.len() == 2));
        assert!(matches!(Persona::Job.placeholder_cards(), DisplayCards::Jobs(ref j) if j.len() == 2));
    }
}
