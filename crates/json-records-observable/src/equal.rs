use crate::value::ObservableValue;

/// Structural equality between two observable values.
///
/// The same array or object handle is always equal to itself. Otherwise
/// arrays compare element by element and objects key by key (key order is
/// ignored). A plain value compares equal to an observable node with the
/// same JSON content.
pub fn deep_equal(a: &ObservableValue, b: &ObservableValue) -> bool {
    if a.same_node(b) {
        return true;
    }
    match (a, b) {
        (ObservableValue::Plain(a), ObservableValue::Plain(b)) => a == b,

        (ObservableValue::Array(arr_a), ObservableValue::Array(arr_b)) => {
            let items_a = arr_a.to_vec();
            let items_b = arr_b.to_vec();
            if items_a.len() != items_b.len() {
                return false;
            }
            items_a
                .iter()
                .zip(items_b.iter())
                .all(|(x, y)| deep_equal(x, y))
        }

        (ObservableValue::Object(obj_a), ObservableValue::Object(obj_b)) => {
            let keys_a = obj_a.keys();
            if keys_a.len() != obj_b.len() {
                return false;
            }
            for key in keys_a {
                match (obj_a.get(&key), obj_b.get(&key)) {
                    (Some(x), Some(y)) => {
                        if !deep_equal(&x, &y) {
                            return false;
                        }
                    }
                    _ => return false,
                }
            }
            true
        }

        // Mixed plain/observable values only arise around reserved keys.
        (ObservableValue::Plain(_), _) | (_, ObservableValue::Plain(_)) => a.to_json() == b.to_json(),

        _ => false,
    }
}
