//! Application tables and their secondary indexes.

use aws_sdk_dynamodb::types::ScalarAttributeType;
use std::fmt;
use std::str::FromStr;

use crate::dynamodb::{TableError, TableSchema};

/// Identifies a table or index schema of the FitSnitch backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableId {
    Users,
    Trainers,
    TrainersByClient,
    TrainerRequests,
    TrainerRequestsByClient,
    Partners,
    PartnersByPartner2,
    PartnerRequests,
    PartnerRequestsByRequestee,
    Snitches,
    CheatMeals,
}

/// Attribute holding the lower-cased `firstname_lastname` used by user search.
pub const USER_SEARCH_ATTRIBUTE: &str = "searchStrings";

impl TableId {
    pub const ALL: [TableId; 11] = [
        TableId::Users,
        TableId::Trainers,
        TableId::TrainersByClient,
        TableId::TrainerRequests,
        TableId::TrainerRequestsByClient,
        TableId::Partners,
        TableId::PartnersByPartner2,
        TableId::PartnerRequests,
        TableId::PartnerRequestsByRequestee,
        TableId::Snitches,
        TableId::CheatMeals,
    ];

    pub fn schema(&self) -> TableSchema {
        match self {
            Self::Users => TableSchema::new("Users", "userId"),
            Self::Trainers => {
                TableSchema::new("TrainerClientAssociations", "trainerId").with_sort_key("clientId")
            }
            Self::TrainersByClient => TableSchema::new("TrainerClientAssociations", "clientId")
                .with_sort_key("trainerId")
                .with_index("clientId-trainerId-index"),
            Self::TrainerRequests => {
                TableSchema::new("TrainerClientRequests", "trainerId").with_sort_key("clientId")
            }
            Self::TrainerRequestsByClient => TableSchema::new("TrainerClientRequests", "clientId")
                .with_sort_key("trainerId")
                .with_index("clientId-trainerId-index"),
            Self::Partners => {
                TableSchema::new("Partners", "partnerId1").with_sort_key("partnerId2")
            }
            Self::PartnersByPartner2 => TableSchema::new("Partners", "partnerId2")
                .with_sort_key("partnerId1")
                .with_index("partnerId2-partnerId1-index"),
            Self::PartnerRequests => {
                TableSchema::new("PartnerRequests", "requester").with_sort_key("requestee")
            }
            Self::PartnerRequestsByRequestee => TableSchema::new("PartnerRequests", "requestee")
                .with_sort_key("requester")
                .with_index("requestee-requester-index"),
            Self::Snitches => TableSchema::new("Snitches", "userId").with_sort_key("created"),
            Self::CheatMeals => TableSchema::new("CheatMeals", "userId").with_sort_key("created"),
        }
    }

    /// The base table an index schema belongs to; a table is its own base.
    pub fn base(&self) -> TableId {
        match self {
            Self::TrainersByClient => Self::Trainers,
            Self::TrainerRequestsByClient => Self::TrainerRequests,
            Self::PartnersByPartner2 => Self::Partners,
            Self::PartnerRequestsByRequestee => Self::PartnerRequests,
            other => *other,
        }
    }

    /// Index schemas defined over this table.
    pub fn indexes(&self) -> Vec<TableSchema> {
        Self::ALL
            .iter()
            .filter(|id| id.base() == *self && id.schema().is_index())
            .map(TableId::schema)
            .collect()
    }

    /// Key attribute type used when provisioning; `created` timestamps are numbers.
    pub fn key_attribute_type(attribute: &str) -> ScalarAttributeType {
        match attribute {
            "created" => ScalarAttributeType::N,
            _ => ScalarAttributeType::S,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Trainers => "trainers",
            Self::TrainersByClient => "trainers-by-client",
            Self::TrainerRequests => "trainer-requests",
            Self::TrainerRequestsByClient => "trainer-requests-by-client",
            Self::Partners => "partners",
            Self::PartnersByPartner2 => "partners-by-partner2",
            Self::PartnerRequests => "partner-requests",
            Self::PartnerRequestsByRequestee => "partner-requests-by-requestee",
            Self::Snitches => "snitches",
            Self::CheatMeals => "cheat-meals",
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableId {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| TableError::validation(format!("Unknown table '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexes_share_base_table_name() {
        for id in TableId::ALL {
            assert_eq!(id.schema().table_name(), id.base().schema().table_name());
            assert!(!id.base().schema().is_index());
        }
    }

    #[test]
    fn test_indexes_of_table() {
        let indexes = TableId::Partners.indexes();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].index_name(), Some("partnerId2-partnerId1-index"));
        assert!(TableId::Users.indexes().is_empty());
    }

    #[test]
    fn test_table_id_from_str() {
        assert_eq!("snitches".parse::<TableId>().unwrap(), TableId::Snitches);
        assert_eq!("Cheat_Meals".parse::<TableId>().unwrap(), TableId::CheatMeals);
        assert!("comments".parse::<TableId>().is_err());
    }
}
