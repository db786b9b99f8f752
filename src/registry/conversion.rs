//! Explicit conversion functions (`toX`) and their `convertsToX` probes
//!
//! Each pair shares one conversion routine: `toX` returns the converted
//! singleton or empty, `convertsToX` returns whether conversion would
//! succeed. Empty input propagates; a multi-item input is an error.

use crate::core::collection::Collection;
use crate::core::error::Result;
use crate::core::value::FhirPathValue;

use super::{FunctionCategory, FunctionContext, FunctionRegistry};

type Converter = fn(&FhirPathValue) -> Option<FhirPathValue>;

fn register_pair(
    registry: &mut FunctionRegistry,
    to_name: &'static str,
    converts_name: &'static str,
    convert: Converter,
) {
    registry.register_eager(
        super::FunctionMetadata::new(
            to_name,
            FunctionCategory::Conversion,
            "Explicit conversion; empty when the value does not convert",
            0,
            Some(0),
        ),
        move |cx| {
            Ok(match cx.input_singleton()? {
                None => Collection::empty(),
                Some(value) => match convert(value) {
                    Some(converted) => Collection::single(converted),
                    None => Collection::empty(),
                },
            })
        },
    );
    registry.register_eager(
        super::FunctionMetadata::new(
            converts_name,
            FunctionCategory::Conversion,
            "True when the explicit conversion would succeed",
            0,
            Some(0),
        ),
        move |cx| {
            Ok(match cx.input_singleton()? {
                None => Collection::empty(),
                Some(value) => {
                    Collection::single(FhirPathValue::Boolean(convert(value).is_some()))
                }
            })
        },
    );
}

impl FunctionRegistry {
    pub(crate) fn register_conversion_functions(&mut self) {
        register_pair(self, "toBoolean", "convertsToBoolean", |v| {
            v.to_boolean(true).map(FhirPathValue::Boolean)
        });
        register_pair(self, "toInteger", "convertsToInteger", |v| {
            v.to_integer(true).map(FhirPathValue::Integer)
        });
        register_pair(self, "toLong", "convertsToLong", |v| {
            v.to_long(true).map(FhirPathValue::Long)
        });
        register_pair(self, "toDecimal", "convertsToDecimal", |v| {
            v.to_decimal(true).map(FhirPathValue::Decimal)
        });
        register_pair(self, "toDate", "convertsToDate", |v| {
            v.to_date(true).map(FhirPathValue::Date)
        });
        register_pair(self, "toDateTime", "convertsToDateTime", |v| {
            v.to_date_time(true).map(FhirPathValue::DateTime)
        });
        register_pair(self, "toTime", "convertsToTime", |v| {
            v.to_time(true).map(FhirPathValue::Time)
        });
        register_pair(self, "toString", "convertsToString", |v| {
            v.to_string_value(true).map(FhirPathValue::String)
        });

        // The quantity pair takes an optional target unit.
        self.register_eager(
            super::FunctionMetadata::new(
                "toQuantity",
                FunctionCategory::Conversion,
                "Explicit quantity conversion, optionally into a target unit",
                0,
                Some(1),
            ),
            |cx| quantity_conversion(cx, false),
        );
        self.register_eager(
            super::FunctionMetadata::new(
                "convertsToQuantity",
                FunctionCategory::Conversion,
                "True when the quantity conversion would succeed",
                0,
                Some(1),
            ),
            |cx| quantity_conversion(cx, true),
        );
    }
}

fn quantity_conversion(cx: &mut FunctionContext<'_>, probe: bool) -> Result<Collection> {
    let Some(value) = cx.input_singleton()? else {
        return Ok(Collection::empty());
    };
    let target_unit = match cx.arg(0) {
        None => None,
        Some(_) => match cx.string_arg(0)? {
            Some(unit) => Some(unit),
            None => return Ok(Collection::empty()),
        },
    };
    let converted = value.to_quantity(true).and_then(|quantity| {
        match &target_unit {
            Some(unit) => quantity.convert_to(unit).ok(),
            None => Some(quantity),
        }
    });
    if probe {
        return Ok(Collection::single(FhirPathValue::Boolean(
            converted.is_some(),
        )));
    }
    Ok(match converted {
        Some(quantity) => Collection::single(FhirPathValue::Quantity(quantity)),
        None => Collection::empty(),
    })
}
