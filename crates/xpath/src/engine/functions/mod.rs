use crate::engine::runtime::FunctionRegistry;
use crate::model::NodeHandle;
use crate::xdm::{Value, ValueType};

pub mod boolean;
pub mod datetime;
pub mod math;
pub mod nodes;
pub mod numeric;
pub mod regex;
pub mod selects;
pub mod strings;

const ANY: Option<ValueType> = None;
const STR: Option<ValueType> = Some(ValueType::String);
const NUM: Option<ValueType> = Some(ValueType::Number);

pub(crate) fn register_default_functions<N: NodeHandle>(reg: &mut FunctionRegistry<N>) {
    macro_rules! reg {
        ($name:expr, $min:expr, $max:expr, $func:expr $(,)?) => {
            reg.register_builtin($name, $min, $max, Vec::new(), $func)
        };
        ($name:expr, $min:expr, $max:expr, $func:expr, [$($ty:expr),+ $(,)?] $(,)?) => {
            reg.register_builtin($name, $min, $max, vec![$($ty),+], $func)
        };
    }

    // ===== Booleans =====
    reg!("true", 0, Some(0), boolean::true_fn::<N>);
    reg!("false", 0, Some(0), boolean::false_fn::<N>);
    reg!("not", 1, Some(1), boolean::not_fn::<N>, [ANY]);
    reg!("boolean", 1, Some(1), boolean::boolean_fn::<N>, [ANY]);
    reg!("boolean-from-string", 1, Some(1), boolean::boolean_from_string_fn::<N>, [STR]);
    reg!("if", 3, Some(3), boolean::if_fn::<N>, [ANY]);

    // ===== Node-set =====
    reg!("last", 0, Some(0), nodes::last_fn::<N>);
    reg!("position", 0, Some(1), nodes::position_fn::<N>, [ANY]);
    reg!("count", 1, Some(1), nodes::count_fn::<N>, [ANY]);
    reg!("local-name", 0, Some(1), nodes::local_name_fn::<N>, [ANY]);
    reg!("name", 0, Some(1), nodes::name_fn::<N>, [ANY]);
    reg!("current", 0, Some(0), nodes::current_fn::<N>);

    // ===== Strings =====
    reg!("string", 0, Some(1), strings::string_fn::<N>, [ANY]);
    reg!("concat", 1, None, strings::concat_fn::<N>, [STR]);
    reg!("starts-with", 2, Some(2), strings::starts_with_fn::<N>, [STR, STR]);
    reg!("ends-with", 2, Some(2), strings::ends_with_fn::<N>, [STR, STR]);
    reg!("contains", 2, Some(2), strings::contains_fn::<N>, [STR, STR]);
    reg!("substring-before", 2, Some(2), strings::substring_before_fn::<N>, [STR, STR]);
    reg!("substring-after", 2, Some(2), strings::substring_after_fn::<N>, [STR, STR]);
    reg!("substring", 2, Some(3), strings::substring_fn::<N>, [STR, NUM, NUM]);
    reg!("string-length", 0, Some(1), strings::string_length_fn::<N>, [STR]);
    reg!("normalize-space", 0, Some(1), strings::normalize_space_fn::<N>, [STR]);
    reg!("translate", 3, Some(3), strings::translate_fn::<N>, [STR, STR, STR]);
    reg!("join", 1, None, strings::join_fn::<N>, [ANY]);
    reg!("coalesce", 2, Some(2), strings::coalesce_fn::<N>, [STR, STR]);
    reg!("regex", 2, Some(2), regex::regex_fn::<N>, [STR, STR]);

    // ===== Numbers =====
    reg!("number", 0, Some(1), numeric::number_fn::<N>, [ANY]);
    reg!("sum", 1, Some(1), numeric::sum_fn::<N>, [ANY]);
    reg!("floor", 1, Some(1), numeric::floor_fn::<N>, [NUM]);
    reg!("ceiling", 1, Some(1), numeric::ceiling_fn::<N>, [NUM]);
    reg!("round", 1, Some(1), numeric::round_fn::<N>, [NUM]);
    reg!("int", 1, Some(1), numeric::int_fn::<N>, [NUM]);
    reg!("abs", 1, Some(1), numeric::abs_fn::<N>, [NUM]);
    reg!("min", 1, None, numeric::min_fn::<N>, [ANY]);
    reg!("max", 1, None, numeric::max_fn::<N>, [ANY]);

    // ===== Math =====
    reg!("pi", 0, Some(0), math::pi_fn::<N>);
    reg!("sqrt", 1, Some(1), math::sqrt_fn::<N>, [NUM]);
    reg!("pow", 2, Some(2), math::pow_fn::<N>, [NUM, NUM]);
    reg!("exp", 1, Some(1), math::exp_fn::<N>, [NUM]);
    reg!("exp10", 1, Some(1), math::exp10_fn::<N>, [NUM]);
    reg!("log", 1, Some(1), math::log_fn::<N>, [NUM]);
    reg!("log10", 1, Some(1), math::log10_fn::<N>, [NUM]);
    reg!("sin", 1, Some(1), math::sin_fn::<N>, [NUM]);
    reg!("cos", 1, Some(1), math::cos_fn::<N>, [NUM]);
    reg!("tan", 1, Some(1), math::tan_fn::<N>, [NUM]);
    reg!("asin", 1, Some(1), math::asin_fn::<N>, [NUM]);
    reg!("acos", 1, Some(1), math::acos_fn::<N>, [NUM]);
    reg!("atan", 1, Some(1), math::atan_fn::<N>, [NUM]);
    reg!("atan2", 2, Some(2), math::atan2_fn::<N>, [NUM, NUM]);

    // ===== Selects =====
    reg!("selected", 2, Some(2), selects::selected_fn::<N>, [STR, STR]);
    reg!("count-selected", 1, Some(1), selects::count_selected_fn::<N>, [STR]);
    reg!("selected-at", 2, Some(2), selects::selected_at_fn::<N>, [STR, NUM]);

    // ===== Date/time =====
    reg!("today", 0, Some(0), datetime::today_fn::<N>);
    reg!("now", 0, Some(0), datetime::now_fn::<N>);
}

/// Text of an argument already coerced to `string`.
pub(super) fn str_arg<N>(args: &[Value<N>], index: usize) -> &str {
    match args.get(index) {
        Some(Value::String(s)) => s,
        _ => "",
    }
}

/// Number of an argument already coerced to `number`.
pub(super) fn num_arg<N>(args: &[Value<N>], index: usize) -> f64 {
    match args.get(index) {
        Some(Value::Number(n)) => *n,
        _ => f64::NAN,
    }
}
