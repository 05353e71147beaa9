//! Arguments carried by a queue invocation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::QueueError;

/// Positional and named arguments for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskArgs {
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl TaskArgs {
    pub fn new(args: Vec<Value>, kwargs: Map<String, Value>) -> Self {
        Self { args, kwargs }
    }

    /// Bind positional and named arguments onto `params`, in order.
    ///
    /// Positionals fill parameters left to right; named arguments fill the
    /// rest. Every parameter must end up bound exactly once, and no names
    /// outside `params` are accepted.
    pub fn bind(&self, task: &str, params: &[&str]) -> Result<Map<String, Value>, QueueError> {
        if self.args.len() > params.len() {
            return Err(QueueError::TooManyArguments {
                task: task.to_string(),
                expected: params.len(),
                given: self.args.len(),
            });
        }

        let mut bound: Map<String, Value> = params
            .iter()
            .zip(&self.args)
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();

        for (name, value) in &self.kwargs {
            if !params.contains(&name.as_str()) {
                return Err(QueueError::UnexpectedArgument {
                    task: task.to_string(),
                    name: name.clone(),
                });
            }
            if bound.insert(name.clone(), value.clone()).is_some() {
                return Err(QueueError::DuplicateArgument {
                    task: task.to_string(),
                    name: name.clone(),
                });
            }
        }

        if let Some(missing) = params.iter().find(|p| !bound.contains_key(**p)) {
            return Err(QueueError::MissingArgument {
                task: task.to_string(),
                name: missing.to_string(),
            });
        }

        Ok(bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    const PARAMS: &[&str] = &["order_id", "project_id", "request_id"];

    fn kwargs(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_bind_kwargs_only() {
        let args = TaskArgs::new(
            vec![],
            kwargs(json!({"order_id": "o1", "project_id": "p1", "request_id": null})),
        );

        let bound = args.bind("process_type_order", PARAMS).unwrap();
        assert_eq!(
            Value::Object(bound),
            json!({"order_id": "o1", "project_id": "p1", "request_id": null})
        );
    }

    #[test]
    fn test_bind_mixed_positional_and_named() {
        let args = TaskArgs::new(
            vec![json!("o1"), json!("p1")],
            kwargs(json!({"request_id": "r1"})),
        );

        let bound = args.bind("process_type_order", PARAMS).unwrap();
        assert_eq!(bound["order_id"], json!("o1"));
        assert_eq!(bound["project_id"], json!("p1"));
        assert_eq!(bound["request_id"], json!("r1"));
    }

    #[test]
    fn test_bind_missing_argument() {
        let args = TaskArgs::new(vec![json!("o1")], Map::new());
        let err = args.bind("process_type_order", PARAMS).unwrap_err();
        assert!(matches!(err, QueueError::MissingArgument { name, .. } if name == "project_id"));
    }

    #[test]
    fn test_bind_unexpected_argument() {
        let args = TaskArgs::new(
            vec![json!("o1"), json!("p1"), json!("r1")],
            kwargs(json!({"colour": "blue"})),
        );
        let err = args.bind("process_type_order", PARAMS).unwrap_err();
        assert!(matches!(err, QueueError::UnexpectedArgument { name, .. } if name == "colour"));
    }

    #[test]
    fn test_bind_duplicate_argument() {
        let args = TaskArgs::new(
            vec![json!("o1")],
            kwargs(json!({"order_id": "o2", "project_id": "p1", "request_id": "r1"})),
        );
        let err = args.bind("process_type_order", PARAMS).unwrap_err();
        assert!(matches!(err, QueueError::DuplicateArgument { name, .. } if name == "order_id"));
    }

    #[test]
    fn test_bind_too_many_positionals() {
        let args = TaskArgs::new(vec![json!(1), json!(2), json!(3), json!(4)], Map::new());
        let err = args.bind("process_type_order", PARAMS).unwrap_err();
        assert!(matches!(
            err,
            QueueError::TooManyArguments {
                expected: 3,
                given: 4,
                ..
            }
        ));
    }

    proptest! {
        // Any split of the parameters into positional prefix + named suffix binds
        #[test]
        fn any_prefix_split_binds(split in 0usize..=3) {
            let values = [json!("o1"), json!("p1"), json!("r1")];
            let positional = values[..split].to_vec();
            let named: Map<String, Value> = PARAMS[split..]
                .iter()
                .zip(&values[split..])
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect();

            let bound = TaskArgs::new(positional, named).bind("t", PARAMS).unwrap();
            prop_assert_eq!(bound.len(), 3);
            prop_assert_eq!(&bound["order_id"], &values[0]);
            prop_assert_eq!(&bound["request_id"], &values[2]);
        }
    }
}
