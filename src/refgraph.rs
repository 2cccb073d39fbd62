//! Resolución de grafos de referencias (`$id` / `$ref`).
//!
//! La API serializa los sub-objetos compartidos (p. ej. el cliente de varias
//! cotizaciones) una sola vez con una etiqueta `$id`, y en el resto de
//! apariciones escribe un puntero `{"$ref": "<id>"}`. Aquí se expanden esos
//! punteros en dos pasadas:
//!
//!   1. Índice: cada objeto de primer nivel, y los campos anidados `Customer`
//!      y `User`, se registran por su `$id` (si se repite, gana el último).
//!   2. Resolución: recorrido recursivo que sustituye cada puntero por el valor
//!      ya resuelto de su destino.
//!
//! Un puntero sin destino (o que vuelve sobre un nodo que se está expandiendo)
//! se sustituye por un objeto vacío y se anota en `Resolved::unresolved`.
//! Nunca es un error.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::warn;

const ID_TAG: &str = "$id";
const REF_TAG: &str = "$ref";
const VALUES_TAG: &str = "$values";

/// Campos anidados que también se indexan en la primera pasada
/// (PascalCase primero, después camelCase).
const INDEXED_NESTED_FIELDS: [[&str; 2]; 2] = [["Customer", "customer"], ["User", "user"]];

/// Nodo tipado del grafo de referencias.
#[derive(Debug, Clone, PartialEq)]
pub enum RefNode {
    /// Valor escalar (null, bool, número o texto).
    Leaf(Value),
    /// `{"$ref": id}`.
    Pointer { id: String },
    /// Nodo que declara una identidad con `$id`.
    Identified { id: String, value: Box<RefNode> },
    Array(Vec<RefNode>),
    Object(Vec<(String, RefNode)>),
}

impl RefNode {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(items) => Self::Array(items.iter().map(Self::from_value).collect()),
            Value::Object(map) => Self::from_object(map),
            other => Self::Leaf(other.clone()),
        }
    }

    fn from_object(map: &Map<String, Value>) -> Self {
        if let Some(Value::String(id)) = map.get(REF_TAG) {
            return Self::Pointer { id: id.clone() };
        }

        if let Some(Value::String(id)) = map.get(ID_TAG) {
            // Colección envuelta: {"$id": "3", "$values": [...]}
            let value = match map.get(VALUES_TAG) {
                Some(Value::Array(items)) if map.len() == 2 => {
                    Self::Array(items.iter().map(Self::from_value).collect())
                }
                _ => Self::Object(
                    map.iter()
                        .filter(|(k, _)| k.as_str() != ID_TAG)
                        .map(|(k, v)| (k.clone(), Self::from_value(v)))
                        .collect(),
                ),
            };
            return Self::Identified { id: id.clone(), value: Box::new(value) };
        }

        Self::Object(map.iter().map(|(k, v)| (k.clone(), Self::from_value(v))).collect())
    }

    /// Campo de un objeto (atravesando la etiqueta `$id` si la hay).
    fn field(&self, key: &str) -> Option<&RefNode> {
        match self {
            Self::Object(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            Self::Identified { value, .. } => value.field(key),
            _ => None,
        }
    }
}

/// Resultado de resolver una secuencia.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub values: Vec<Value>,
    /// Identificadores de los punteros que se degradaron a objeto vacío.
    pub unresolved: Vec<String>,
}

enum Lookup<'a> {
    Found(&'a RefNode),
    Missing,
}

struct Resolver<'a> {
    table: HashMap<&'a str, &'a RefNode>,
    expanding: HashSet<String>,
    unresolved: Vec<String>,
}

impl<'a> Resolver<'a> {
    fn index(nodes: &'a [RefNode]) -> Self {
        let mut table = HashMap::new();
        for node in nodes {
            register(&mut table, node);
            for candidates in INDEXED_NESTED_FIELDS {
                if let Some(nested) = candidates.iter().find_map(|key| node.field(key)) {
                    register(&mut table, nested);
                }
            }
        }
        Self {
            table,
            expanding: HashSet::new(),
            unresolved: Vec::new(),
        }
    }

    fn lookup(&self, id: &str) -> Lookup<'a> {
        match self.table.get(id) {
            Some(node) if !self.expanding.contains(id) => Lookup::Found(*node),
            _ => Lookup::Missing,
        }
    }

    fn resolve(&mut self, node: &'a RefNode) -> Value {
        match node {
            RefNode::Leaf(value) => value.clone(),
            RefNode::Pointer { id } => match self.lookup(id) {
                Lookup::Found(target) => self.resolve(target),
                Lookup::Missing => {
                    warn!("Referencia '{id}' sin resolver; se usa un objeto vacío.");
                    self.unresolved.push(id.clone());
                    Value::Object(Map::new())
                }
            },
            RefNode::Identified { id, value } => {
                self.expanding.insert(id.clone());
                let inner = self.resolve(value);
                self.expanding.remove(id);
                match inner {
                    Value::Object(mut map) => {
                        map.insert(ID_TAG.to_string(), Value::String(id.clone()));
                        Value::Object(map)
                    }
                    other => {
                        let mut map = Map::new();
                        map.insert(ID_TAG.to_string(), Value::String(id.clone()));
                        map.insert(VALUES_TAG.to_string(), other);
                        Value::Object(map)
                    }
                }
            }
            RefNode::Array(items) => Value::Array(items.iter().map(|n| self.resolve(n)).collect()),
            RefNode::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), self.resolve(v)))
                    .collect(),
            ),
        }
    }
}

fn register<'a>(table: &mut HashMap<&'a str, &'a RefNode>, node: &'a RefNode) {
    if let RefNode::Identified { id, .. } = node {
        table.insert(id.as_str(), node);
    }
}

/// Expande todos los punteros de `input`. No modifica la entrada.
pub fn resolve(input: &[Value]) -> Resolved {
    let nodes: Vec<RefNode> = input.iter().map(RefNode::from_value).collect();
    let mut resolver = Resolver::index(&nodes);
    let values = nodes.iter().map(|n| resolver.resolve(n)).collect();
    Resolved {
        values,
        unresolved: resolver.unresolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shared_customer_is_expanded_in_every_record() {
        let input = vec![
            json!({"$id": "1", "Id": 10, "Customer": {"$id": "2", "Name": "Ana", "LastName": "Ruiz"}}),
            json!({"$id": "3", "Id": 11, "Customer": {"$ref": "2"}}),
        ];
        let out = resolve(&input);
        assert!(out.unresolved.is_empty());
        assert_eq!(out.values[1]["Customer"]["Name"], "Ana");
        assert_eq!(out.values[1]["Customer"]["LastName"], "Ruiz");
        assert_eq!(out.values[0]["Customer"], out.values[1]["Customer"]);
    }

    #[test]
    fn pointer_to_top_level_record_is_expanded() {
        let input = vec![
            json!({"$id": "1", "Total": 5}),
            json!({"Previous": {"$ref": "1"}}),
        ];
        let out = resolve(&input);
        assert_eq!(out.values[1]["Previous"]["Total"], 5);
    }

    #[test]
    fn missing_target_becomes_empty_object() {
        let input = vec![json!({"Id": 1, "Customer": {"$ref": "99"}})];
        let out = resolve(&input);
        assert_eq!(out.values[0]["Customer"], json!({}));
        assert_eq!(out.unresolved, vec!["99".to_string()]);
    }

    #[test]
    fn ids_declared_deeper_than_the_indexed_fields_are_not_targets() {
        let input = vec![
            json!({"Id": 1, "WorkPlace": {"$id": "7", "Name": "Oficina"}}),
            json!({"Id": 2, "WorkPlace": {"$ref": "7"}}),
        ];
        let out = resolve(&input);
        assert_eq!(out.values[1]["WorkPlace"], json!({}));
    }

    #[test]
    fn pointer_free_payload_is_returned_unchanged() {
        let input = vec![
            json!({"$id": "1", "Id": 1, "Customer": {"$id": "2", "Name": "Ana"}, "Tags": ["a", "b"]}),
            json!({"id": 2, "total": "1,000.00", "nested": {"deep": [1, 2, {"x": null}]}}),
        ];
        let out = resolve(&input);
        assert_eq!(out.values, input);
    }

    #[test]
    fn resolving_twice_yields_the_same_value() {
        let input = vec![
            json!({"$id": "1", "User": {"$id": "2", "Name": "Luis"}}),
            json!({"$id": "3", "User": {"$ref": "2"}}),
            json!({"$id": "4", "User": {"$ref": "2"}}),
        ];
        let once = resolve(&input);
        let twice = resolve(&once.values);
        assert_eq!(once.values, twice.values);
        assert!(twice.unresolved.is_empty());
    }

    #[test]
    fn repeated_id_last_registration_wins() {
        let input = vec![
            json!({"$id": "1", "Name": "primero"}),
            json!({"$id": "1", "Name": "segundo"}),
            json!({"Ref": {"$ref": "1"}}),
        ];
        let out = resolve(&input);
        assert_eq!(out.values[2]["Ref"]["Name"], "segundo");
    }

    #[test]
    fn wrapped_collections_keep_their_values_wrapper() {
        let input = vec![json!({
            "$id": "1",
            "Versions": {"$id": "2", "$values": [{"$id": "3", "Version": 1}]}
        })];
        let out = resolve(&input);
        assert_eq!(out.values, input);
        assert_eq!(
            RefNode::from_value(&input[0]["Versions"]),
            RefNode::Identified {
                id: "2".into(),
                value: Box::new(RefNode::Array(vec![RefNode::Identified {
                    id: "3".into(),
                    value: Box::new(RefNode::Object(vec![(
                        "Version".into(),
                        RefNode::Leaf(json!(1))
                    )])),
                }])),
            }
        );
    }

    #[test]
    fn self_reference_degrades_instead_of_looping() {
        let input = vec![json!({"$id": "1", "Name": "ciclo", "Self": {"$ref": "1"}})];
        let out = resolve(&input);
        assert_eq!(out.values[0]["Self"], json!({}));
        assert_eq!(out.unresolved, vec!["1".to_string()]);
    }

    #[test]
    fn input_is_not_mutated() {
        let input = vec![json!({"A": {"$ref": "nope"}})];
        let before = input.clone();
        let _ = resolve(&input);
        assert_eq!(input, before);
    }
}
