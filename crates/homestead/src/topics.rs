use serde::Serialize;

/// A real-estate area the assistant is prepared to discuss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Topic {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub examples: [&'static str; 4],
}

impl Topic {
    /// The opening question sent when a user picks this topic
    pub fn starter_prompt(&self) -> String {
        format!(
            "I have a question about {}. Can you help me understand {}?",
            self.name, self.description
        )
    }
}

pub static TOPICS: [Topic; 8] = [
    Topic {
        id: "buying-selling",
        name: "Buying & Selling",
        description: "Purchase agreements, closings, title issues",
        examples: [
            "Purchase contracts",
            "Closing procedures",
            "Title problems",
            "Escrow issues",
        ],
    },
    Topic {
        id: "landlord-tenant",
        name: "Landlord-Tenant",
        description: "Rental agreements, evictions, security deposits",
        examples: [
            "Lease agreements",
            "Eviction process",
            "Security deposits",
            "Tenant rights",
        ],
    },
    Topic {
        id: "property-disputes",
        name: "Property Disputes",
        description: "Boundary disputes, easements, neighbor issues",
        examples: [
            "Boundary disputes",
            "Easement rights",
            "Neighbor conflicts",
            "Property damage",
        ],
    },
    Topic {
        id: "financing-mortgages",
        name: "Financing & Mortgages",
        description: "Loan terms, foreclosures, refinancing",
        examples: [
            "Mortgage terms",
            "Foreclosure defense",
            "Refinancing",
            "Loan modifications",
        ],
    },
    Topic {
        id: "zoning-permits",
        name: "Zoning & Permits",
        description: "Building permits, zoning laws, development",
        examples: [
            "Building permits",
            "Zoning violations",
            "Development rights",
            "Land use",
        ],
    },
    Topic {
        id: "property-management",
        name: "Property Management",
        description: "HOA issues, maintenance, property taxes",
        examples: [
            "HOA disputes",
            "Property maintenance",
            "Tax assessments",
            "Insurance claims",
        ],
    },
    Topic {
        id: "commercial-real-estate",
        name: "Commercial Real Estate",
        description: "Commercial leases, investment properties",
        examples: [
            "Commercial leases",
            "Investment properties",
            "Business sales",
            "Development deals",
        ],
    },
    Topic {
        id: "estate-planning",
        name: "Estate & Property Transfer",
        description: "Inheritance, wills, property transfer",
        examples: [
            "Property inheritance",
            "Estate planning",
            "Trust properties",
            "Transfer on death",
        ],
    },
];

pub fn find_topic(id: &str) -> Option<&'static Topic> {
    TOPICS.iter().find(|topic| topic.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique() {
        let ids: HashSet<_> = TOPICS.iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), TOPICS.len());
    }

    #[test]
    fn test_starter_prompt() {
        let topic = find_topic("landlord-tenant").unwrap();
        assert_eq!(
            topic.starter_prompt(),
            "I have a question about Landlord-Tenant. Can you help me understand Rental agreements, evictions, security deposits?"
        );
        assert!(find_topic("maritime").is_none());
    }
}
