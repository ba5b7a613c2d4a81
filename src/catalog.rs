//! Welfare scheme catalog.
//!
//! A fixed table of government schemes the model may match a caller to,
//! the system instruction that embeds it, and the `display_scheme` tool the
//! model calls to put a scheme on screen.

use crate::defaults::DISPLAY_SCHEME_TOOL;
use crate::error::{LingoError, Result};
use crate::live::protocol::FunctionDeclaration;
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;

/// Scheme category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Agriculture,
    Health,
    Education,
    Housing,
    Finance,
    Business,
    #[serde(rename = "Social Welfare")]
    SocialWelfare,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Agriculture => "Agriculture",
            Category::Health => "Health",
            Category::Education => "Education",
            Category::Housing => "Housing",
            Category::Finance => "Finance",
            Category::Business => "Business",
            Category::SocialWelfare => "Social Welfare",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One government scheme.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scheme {
    /// Identifier the model refers to in `display_scheme` calls.
    pub id: &'static str,
    pub name: &'static str,
    /// Year the scheme was launched.
    pub year: &'static str,
    pub category: Category,
    pub ministry: &'static str,
    pub objective: &'static str,
    pub explanation: &'static str,
    pub eligibility: &'static str,
    /// Documents to bring, in order.
    pub checklist: &'static [&'static str],
}

/// Every scheme Lingo knows about.
pub const SCHEMES: &[Scheme] = &[
    Scheme {
        id: "ayushman-bharat",
        name: "Ayushman Bharat (PM-JAY)",
        year: "2018",
        category: Category::Health,
        ministry: "Ministry of Health and Family Welfare",
        objective: "Universal health coverage for the poor",
        explanation: "Provides up to ₹5 lakh per family per year for hospital treatment. It is cashless and covers pre-existing diseases.",
        eligibility: "Families listed in the SECC database (mostly low-income or marginalized), or those with valid Ration Cards under specific categories.",
        checklist: &[
            "Aadhaar Card",
            "Ration Card",
            "PM-JAY ID/Card",
            "Mobile Number",
        ],
    },
    Scheme {
        id: "pm-mudra",
        name: "PM MUDRA Yojana",
        year: "2015",
        category: Category::Business,
        ministry: "Ministry of Finance",
        objective: "Provide loans to small/micro-enterprises",
        explanation: "Provides loans up to ₹10 lakh to start or expand a small business without needing any security or collateral.",
        eligibility: "Any Indian citizen who has a business plan for a non-farm sector income-generating activity such as manufacturing, trading or service sector.",
        checklist: &[
            "Business Proof",
            "Aadhaar Card",
            "Identity Proof",
            "Recent Passport Photos",
        ],
    },
    Scheme {
        id: "pm-awas",
        name: "Pradhan Mantri Awas Yojana (PMAY)",
        year: "2015",
        category: Category::Housing,
        ministry: "Ministry of Housing and Urban Affairs",
        objective: "Housing for All",
        explanation: "Provides a subsidy to help you build your own permanent home.",
        eligibility: "Families with an annual income between ₹3 lakh to ₹18 lakh who do not already own a pucca (permanent) house anywhere in India.",
        checklist: &[
            "Aadhaar Card",
            "Income Certificate",
            "Caste Certificate",
            "Affidavit of not owning a pucca house",
        ],
    },
    Scheme {
        id: "pm-kisan",
        name: "PM-KISAN Samman Nidhi",
        year: "2019",
        category: Category::Agriculture,
        ministry: "Ministry of Agriculture & Farmers Welfare",
        objective: "Income support to farmers",
        explanation: "Provides ₹6,000 yearly in three installments directly to your bank account.",
        eligibility: "Small and marginal farmer families who own cultivable land in their names.",
        checklist: &["Land Records", "Aadhaar Card", "Bank Account Details"],
    },
    Scheme {
        id: "sukanya-samriddhi",
        name: "Sukanya Samriddhi Yojana",
        year: "2015",
        category: Category::SocialWelfare,
        ministry: "Ministry of Women and Child Development",
        objective: "Savings for a girl child's education/marriage",
        explanation: "A high-interest savings account for a girl child's future needs.",
        eligibility: "Parents or legal guardians can open this account for a girl child from her birth until she reaches the age of 10 years.",
        checklist: &[
            "Girl Child's Birth Certificate",
            "Guardian's Identity Proof",
            "Guardian's Address Proof",
        ],
    },
    Scheme {
        id: "jan-dhan",
        name: "PM Jan Dhan Yojana (PMJDY)",
        year: "2014",
        category: Category::Finance,
        ministry: "Ministry of Finance",
        objective: "Financial inclusion for all",
        explanation: "Allows anyone to open a basic bank account with no minimum balance and get a free debit card.",
        eligibility: "Any Indian resident aged 10 years and above who does not have a bank account.",
        checklist: &[
            "Aadhaar Card",
            "Voter ID or NREGA card",
            "Passport sized photo",
        ],
    },
    Scheme {
        id: "digital-india",
        name: "Digital India Scholarships",
        year: "2015",
        category: Category::Education,
        ministry: "Ministry of Electronics & IT",
        objective: "Supporting digital education and skills",
        explanation: "Financial aid for students pursuing technology and digital courses.",
        eligibility: "Students from economically weaker sections or backward classes currently enrolled in recognized educational institutions.",
        checklist: &[
            "Mark Sheets",
            "Aadhaar Card",
            "Bank Passbook",
            "Income Certificate",
        ],
    },
    Scheme {
        id: "standup-india",
        name: "Stand-Up India Scheme",
        year: "2016",
        category: Category::Business,
        ministry: "Ministry of Finance",
        objective: "Support women and SC/ST entrepreneurs",
        explanation: "Facilitates bank loans between ₹10 lakh and ₹1 crore for setting up a new business.",
        eligibility: "SC/ST and/or Women entrepreneurs above 18 years of age setting up their first (greenfield) enterprise.",
        checklist: &[
            "Project Report",
            "Caste Certificate",
            "Proof of Identity",
            "Income Tax Returns",
        ],
    },
    Scheme {
        id: "atp-pension",
        name: "Atal Pension Yojana (APY)",
        year: "2015",
        category: Category::SocialWelfare,
        ministry: "Ministry of Finance",
        objective: "Pension for the unorganized sector",
        explanation: "A guaranteed monthly pension for workers who don't have government or corporate pensions.",
        eligibility: "Any Indian citizen between the age of 18 and 40 years who has a valid bank account.",
        checklist: &["Bank Account Details", "Mobile Number", "Aadhaar Card"],
    },
];

/// Look up a scheme by exact identifier.
pub fn find_scheme(id: &str) -> Option<&'static Scheme> {
    SCHEMES.iter().find(|s| s.id == id)
}

/// All schemes, in catalog order.
pub fn list_schemes() -> &'static [Scheme] {
    SCHEMES
}

const PERSONA: &str = "\
You are 'Lingo', a warm, multilingual, empathetic, and expert voice assistant for Indian citizens.

CORE TASK:
1. Detect the user's language (e.g., Tamil, Hindi, etc.) and respond ONLY in that language.
2. Listen to the user's story or situation (e.g., 'I am a 25 year old woman wanting to start a boutique').
3. ANALYZE if the user is likely eligible for a scheme based on the 'eligibility' rules in the data.
4. If a match is found, call 'display_scheme' with translated details.
5. In your spoken response, specifically tell them WHY they are eligible or what condition they must meet (e.g., 'Since you are a woman starting a new business, you are eligible for Stand-Up India').

FUNCTION CALLING RULES:
- You MUST provide: schemeId, translatedName, translatedExplanation, translatedEligibility, and translatedChecklist.
- All text strings MUST be in the user's spoken language.

Schemes Data:
";

/// The system instruction: persona rules followed by the catalog as JSON.
pub fn system_instruction() -> Result<String> {
    let data = serde_json::to_string(SCHEMES)
        .map_err(|e| LingoError::Other(format!("Failed to serialize scheme catalog: {}", e)))?;
    Ok(format!("{}{}\n", PERSONA, data))
}

/// Declaration of the `display_scheme` tool.
pub fn display_scheme_declaration() -> FunctionDeclaration {
    let string = |description: &str| json!({ "type": "STRING", "description": description });
    FunctionDeclaration {
        name: DISPLAY_SCHEME_TOOL.to_string(),
        description: None,
        parameters: json!({
            "type": "OBJECT",
            "description": "Call this function to display a government scheme card with localized translations.",
            "properties": {
                "schemeId": string("The ID of the scheme from the database."),
                "translatedName": string("The name of the scheme translated into the user's language."),
                "translatedExplanation": string("A simple explanation of the scheme translated into the user's language."),
                "translatedEligibility": string("Analysis of user eligibility translated into the user's language."),
                "translatedChecklist": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "description": "The document checklist translated into the user's language."
                }
            },
            "required": [
                "schemeId",
                "translatedName",
                "translatedExplanation",
                "translatedEligibility",
                "translatedChecklist"
            ]
        }),
    }
}

/// Arguments of a `display_scheme` call.
///
/// Only `schemeId` is checked strictly. A translated field of the wrong type
/// is treated as absent so the catalog text shows instead. Extra fields are
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplaySchemeArgs {
    pub scheme_id: Option<String>,
    pub translated_name: Option<String>,
    pub translated_explanation: Option<String>,
    pub translated_eligibility: Option<String>,
    pub translated_checklist: Option<Vec<String>>,
}

impl DisplaySchemeArgs {
    pub fn from_value(args: &Value) -> Result<Self> {
        let invalid = |message: &str| LingoError::Protocol {
            message: format!("Invalid display_scheme arguments: {}", message),
        };
        let fields = args
            .as_object()
            .ok_or_else(|| invalid("expected an object"))?;

        let scheme_id = match fields.get("schemeId") {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(id.clone()),
            Some(other) => {
                return Err(invalid(&format!("schemeId must be a string, got {}", other)));
            }
        };
        let text = |key: &str| {
            fields
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let translated_checklist = fields
            .get("translatedChecklist")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            });

        Ok(Self {
            scheme_id,
            translated_name: text("translatedName"),
            translated_explanation: text("translatedExplanation"),
            translated_eligibility: text("translatedEligibility"),
            translated_checklist,
        })
    }
}

/// A catalog scheme with the model's localized overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayedScheme {
    pub scheme: &'static Scheme,
    pub translated_name: Option<String>,
    pub translated_explanation: Option<String>,
    pub translated_eligibility: Option<String>,
    pub translated_checklist: Option<Vec<String>>,
}

impl DisplayedScheme {
    /// The scheme without any overrides.
    pub fn base(scheme: &'static Scheme) -> Self {
        Self {
            scheme,
            translated_name: None,
            translated_explanation: None,
            translated_eligibility: None,
            translated_checklist: None,
        }
    }

    /// Resolve a tool call against the catalog. `None` when the id is
    /// missing or unknown.
    ///
    /// Blank strings and an empty checklist count as absent, so an empty
    /// translated checklist shows the catalog documents rather than an
    /// empty list.
    pub fn resolve(args: DisplaySchemeArgs) -> Option<Self> {
        let scheme = find_scheme(args.scheme_id.as_deref()?)?;
        let non_empty = |s: Option<String>| s.filter(|s| !s.trim().is_empty());
        Some(Self {
            scheme,
            translated_name: non_empty(args.translated_name),
            translated_explanation: non_empty(args.translated_explanation),
            translated_eligibility: non_empty(args.translated_eligibility),
            translated_checklist: args.translated_checklist.filter(|c| !c.is_empty()),
        })
    }

    pub fn id(&self) -> &'static str {
        self.scheme.id
    }

    pub fn name(&self) -> &str {
        self.translated_name.as_deref().unwrap_or(self.scheme.name)
    }

    pub fn explanation(&self) -> &str {
        self.translated_explanation
            .as_deref()
            .unwrap_or(self.scheme.explanation)
    }

    pub fn eligibility(&self) -> &str {
        self.translated_eligibility
            .as_deref()
            .unwrap_or(self.scheme.eligibility)
    }

    pub fn checklist(&self) -> Vec<&str> {
        match &self.translated_checklist {
            Some(items) => items.iter().map(String::as_str).collect(),
            None => self.scheme.checklist.to_vec(),
        }
    }
}
