//! The program view handed to the rule runtime

use crate::error::TsdError;
use crate::semantic::{
    ActionDefinition, Expression, Fact, FactAssignment, Removal, TypeDefinition, XupleSpace,
};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;

/// A fact together with the fields the runtime synthesizes for it
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFact {
    pub fact: Fact,
    pub id: String,
}

impl Serialize for NormalizedFact {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(5))?;
        map.serialize_entry("type", "fact")?;
        map.serialize_entry("typeName", &self.fact.type_name)?;
        map.serialize_entry("fields", &self.fact.fields)?;
        map.serialize_entry("_id_", &self.id)?;
        map.serialize_entry("reteType", &self.fact.type_name)?;
        map.end()
    }
}

/// Accepted declarations in acceptance order
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedProgram {
    pub types: Vec<TypeDefinition>,
    pub actions: Vec<ActionDefinition>,
    pub expressions: Vec<Expression>,
    pub facts: Vec<NormalizedFact>,
    pub fact_assignments: Vec<FactAssignment>,
    pub rule_removals: Vec<Removal>,
    pub fact_retractions: Vec<Removal>,
    pub xuple_spaces: Vec<XupleSpace>,
}

impl NormalizedProgram {
    pub fn to_json(&self) -> Result<Value, TsdError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json_string(&self, pretty: bool) -> Result<String, TsdError> {
        let text = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(text)
    }
}
