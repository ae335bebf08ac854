//! Ordered substitution rules
//!
//! The first rule whose predicate accepts a value encodes it; decoding picks
//! the first rule that reads the wire form. The fallback rule is last and
//! accepts everything the earlier rules did not claim.

use crate::{
    Captured, CapturedRecord, CodecError, ContextRef, ContinuationCodec, FragmentRef, Wire,
};

pub(crate) struct Rule {
    pub name: &'static str,
    pub accepts: fn(&Captured) -> bool,
    pub reads: fn(&Wire) -> bool,
    pub write: fn(&ContinuationCodec<'_>, &Captured) -> Result<Wire, CodecError>,
    pub read: fn(&ContinuationCodec<'_>, Wire) -> Result<Captured, CodecError>,
}

pub(crate) static RULES: [Rule; 6] = [
    Rule {
        name: "current_context",
        accepts: accepts_current_context,
        reads: reads_current_context,
        write: write_current_context,
        read: read_current_context,
    },
    Rule {
        name: "singleton",
        accepts: accepts_singleton,
        reads: reads_singleton,
        write: write_singleton,
        read: read_singleton,
    },
    Rule {
        name: "context",
        accepts: accepts_context,
        reads: reads_context,
        write: write_context,
        read: read_context,
    },
    Rule {
        name: "fragment",
        accepts: accepts_fragment,
        reads: reads_fragment,
        write: write_fragment,
        read: read_fragment,
    },
    Rule {
        name: "suspension",
        accepts: accepts_suspension,
        reads: reads_suspension,
        write: write_suspension,
        read: read_suspension,
    },
    Rule {
        name: "fallback",
        accepts: accepts_any,
        reads: reads_any,
        write: write_plain,
        read: read_plain,
    },
];

fn misrouted(rule: &str, what: &str) -> CodecError {
    CodecError::UnsupportedValue(format!("rule {} cannot handle {}", rule, what))
}

fn accepts_any(_: &Captured) -> bool {
    true
}

fn reads_any(_: &Wire) -> bool {
    true
}

// Rule 1: the attached context marker

fn accepts_current_context(value: &Captured) -> bool {
    matches!(value, Captured::CurrentContext)
}

fn reads_current_context(wire: &Wire) -> bool {
    matches!(wire, Wire::CurrentContext)
}

fn write_current_context(_: &ContinuationCodec<'_>, _: &Captured) -> Result<Wire, CodecError> {
    Ok(Wire::CurrentContext)
}

fn read_current_context(codec: &ContinuationCodec<'_>, _: Wire) -> Result<Captured, CodecError> {
    codec
        .require_context("substitute the current context")
        .map(Captured::Context)
}

// Rule 2: named singletons

fn accepts_singleton(value: &Captured) -> bool {
    matches!(value, Captured::Singleton(_))
}

fn reads_singleton(wire: &Wire) -> bool {
    matches!(wire, Wire::Singleton(_))
}

fn write_singleton(_: &ContinuationCodec<'_>, value: &Captured) -> Result<Wire, CodecError> {
    let Captured::Singleton(name) = value else {
        return Err(misrouted("singleton", value.kind()));
    };
    Ok(Wire::Singleton(name.clone()))
}

fn read_singleton(codec: &ContinuationCodec<'_>, wire: Wire) -> Result<Captured, CodecError> {
    let Wire::Singleton(name) = wire else {
        return Err(misrouted("singleton", "non-singleton wire value"));
    };
    if !codec.knows_singleton(&name) {
        return Err(CodecError::UnresolvedReference(format!("singleton {}", name)));
    }
    Ok(Captured::Singleton(name))
}

// Rule 3: contexts

fn accepts_context(value: &Captured) -> bool {
    matches!(value, Captured::Context(_))
}

fn reads_context(wire: &Wire) -> bool {
    matches!(wire, Wire::Context(_))
}

fn write_context(codec: &ContinuationCodec<'_>, value: &Captured) -> Result<Wire, CodecError> {
    let Captured::Context(id) = value else {
        return Err(misrouted("context", value.kind()));
    };
    let host = codec.host();
    if *id == host.application_context() {
        return Ok(Wire::Context(ContextRef::Application));
    }
    if codec.context() == Some(*id) {
        let info = host
            .context_info(*id)
            .ok_or_else(|| CodecError::UnresolvedReference(format!("context {}", id)))?;
        return Ok(Wire::Context(ContextRef::SelfContext { class: info.class }));
    }
    Err(CodecError::UnsupportedValue(format!(
        "{} is neither the attached context nor the application context",
        id
    )))
}

fn read_context(codec: &ContinuationCodec<'_>, wire: Wire) -> Result<Captured, CodecError> {
    let Wire::Context(reference) = wire else {
        return Err(misrouted("context", "non-context wire value"));
    };
    let host = codec.host();
    match reference {
        ContextRef::SelfContext { class } => {
            let id = codec.require_context("resolve a self-context reference")?;
            let info = host
                .context_info(id)
                .ok_or_else(|| CodecError::UnresolvedReference(format!("context {}", id)))?;
            if !host.is_instance_of(&info.class, &class) {
                return Err(CodecError::TypeMismatch {
                    expected: class,
                    found: info.class,
                });
            }
            Ok(Captured::Context(id))
        }
        ContextRef::Application => Ok(Captured::Context(host.application_context())),
        ContextRef::Other => Err(CodecError::UnsupportedValue(
            "references to foreign contexts cannot be restored".to_string(),
        )),
    }
}

// Rule 4: fragments

fn accepts_fragment(value: &Captured) -> bool {
    matches!(value, Captured::Fragment(_))
}

fn reads_fragment(wire: &Wire) -> bool {
    matches!(wire, Wire::Fragment(_))
}

fn write_fragment(codec: &ContinuationCodec<'_>, value: &Captured) -> Result<Wire, CodecError> {
    let Captured::Fragment(id) = value else {
        return Err(misrouted("fragment", value.kind()));
    };
    let info = codec
        .host()
        .fragment_info(*id)
        .ok_or_else(|| CodecError::UnresolvedReference(format!("fragment {}", id)))?;
    let reference = match (info.container_id, info.tag) {
        (Some(id), _) => FragmentRef::ById {
            class: info.class,
            id,
        },
        (None, Some(tag)) => FragmentRef::ByTag {
            class: info.class,
            tag,
        },
        (None, None) => FragmentRef::WithoutHandle { class: info.class },
    };
    Ok(Wire::Fragment(reference))
}

fn read_fragment(codec: &ContinuationCodec<'_>, wire: Wire) -> Result<Captured, CodecError> {
    let Wire::Fragment(reference) = wire else {
        return Err(misrouted("fragment", "non-fragment wire value"));
    };
    let host = codec.host();
    let (class, found, description) = match reference {
        FragmentRef::WithoutHandle { .. } => return Ok(Captured::Null),
        FragmentRef::ById { class, id } => {
            let context = codec.require_context("resolve a fragment")?;
            (
                class,
                host.find_fragment_by_id(context, id),
                format!("fragment with id {}", id),
            )
        }
        FragmentRef::ByTag { class, tag } => {
            let context = codec.require_context("resolve a fragment")?;
            let found = host.find_fragment_by_tag(context, &tag);
            (class, found, format!("fragment with tag {}", tag))
        }
    };

    let id = found.ok_or(CodecError::UnresolvedReference(description))?;
    let info = host
        .fragment_info(id)
        .ok_or_else(|| CodecError::UnresolvedReference(format!("fragment {}", id)))?;
    if !host.is_instance_of(&info.class, &class) {
        return Err(CodecError::TypeMismatch {
            expected: class,
            found: info.class,
        });
    }
    Ok(Captured::Fragment(id))
}

// Rule 5: suspension markers

fn accepts_suspension(value: &Captured) -> bool {
    matches!(value, Captured::Suspension(_))
}

fn reads_suspension(wire: &Wire) -> bool {
    matches!(wire, Wire::Suspension(_))
}

fn write_suspension(_: &ContinuationCodec<'_>, value: &Captured) -> Result<Wire, CodecError> {
    let Captured::Suspension(marker) = value else {
        return Err(misrouted("suspension", value.kind()));
    };
    Ok(Wire::Suspension(*marker))
}

fn read_suspension(_: &ContinuationCodec<'_>, wire: Wire) -> Result<Captured, CodecError> {
    let Wire::Suspension(marker) = wire else {
        return Err(misrouted("suspension", "non-marker wire value"));
    };
    Ok(Captured::Suspension(marker))
}

// Rule 6: plain data, field by field

fn write_plain(codec: &ContinuationCodec<'_>, value: &Captured) -> Result<Wire, CodecError> {
    Ok(match value {
        Captured::Null => Wire::Null,
        Captured::Bool(v) => Wire::Bool(*v),
        Captured::Int(v) => Wire::Int(*v),
        Captured::Str(v) => Wire::Str(v.clone()),
        Captured::Bytes(v) => Wire::Bytes(v.clone()),
        Captured::List(items) => Wire::List(
            items
                .iter()
                .map(|item| codec.encode_value(item))
                .collect::<Result<_, _>>()?,
        ),
        Captured::Record(record) => Wire::Record {
            type_name: record.type_name().to_string(),
            fields: record
                .fields()
                .iter()
                .map(|(name, field)| Ok((name.clone(), codec.encode_value(field)?)))
                .collect::<Result<_, CodecError>>()?,
        },
        other => return Err(misrouted("fallback", other.kind())),
    })
}

fn read_plain(codec: &ContinuationCodec<'_>, wire: Wire) -> Result<Captured, CodecError> {
    Ok(match wire {
        Wire::Null => Captured::Null,
        Wire::Bool(v) => Captured::Bool(v),
        Wire::Int(v) => Captured::Int(v),
        Wire::Str(v) => Captured::Str(v),
        Wire::Bytes(v) => Captured::Bytes(v),
        Wire::List(items) => Captured::List(
            items
                .into_iter()
                .map(|item| codec.decode_value(item))
                .collect::<Result<_, _>>()?,
        ),
        Wire::Record { type_name, fields } => {
            let fields = fields
                .into_iter()
                .map(|(name, field)| Ok((name, codec.decode_value(field)?)))
                .collect::<Result<_, CodecError>>()?;
            Captured::Record(CapturedRecord::from_parts(type_name, fields))
        }
        _ => return Err(misrouted("fallback", "reference wire value")),
    })
}
