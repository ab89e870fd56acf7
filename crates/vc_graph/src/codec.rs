use alloc::sync::Arc;
use std::io::{Cursor, Write};

use crate::driver::{ContextLease, DriverContext, DriverRegistry};
use crate::graph::{GraphReader, GraphWriter, MutationLog};
use crate::object::{KnownObjects, Value};
use crate::stream::{Pass, RewindableStream};
use crate::wire::{Header, PrimReader, PrimWriter};
use crate::{Action, CodecOptions, GraphError, SessionError};

// -----------------------------------------------------------------------------
// Codec

/// Encodes and decodes object graphs with the drivers of one registry.
///
/// ```
/// use vc_graph::{Codec, DriverRegistry, ObjectRef, Type, Value};
/// use vc_graph::object::Fields;
///
/// let node = Type::sealed("app", "Node");
/// let registry = DriverRegistry::builder().register_type(node.clone()).build();
/// let codec = Codec::new(registry);
///
/// let object = ObjectRef::with_fields(node, Fields::from_iter([("name", Value::from("root"))]));
/// let bytes = codec.encode_to_vec(&Value::Object(object)).unwrap();
///
/// let decoded = codec.decode_slice(&bytes).into_value().unwrap();
/// assert_eq!(decoded.field("name"), Some(Value::from("root")));
/// ```
#[derive(Clone)]
pub struct Codec {
    registry: Arc<DriverRegistry>,
    options: CodecOptions,
}

impl Codec {
    pub fn new(registry: Arc<DriverRegistry>) -> Self {
        Self {
            registry,
            options: CodecOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CodecOptions) -> Self {
        self.options = options;
        self
    }

    #[inline]
    pub fn registry(&self) -> &Arc<DriverRegistry> {
        &self.registry
    }

    #[inline]
    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// A session without a driver context or known objects.
    #[inline]
    pub fn session(&self) -> Session<'_> {
        Session {
            codec: self,
            context: None,
            known: None,
        }
    }

    #[inline]
    pub fn encode(&self, value: &Value, out: &mut dyn Write) -> Result<(), SessionError> {
        self.session().encode(value, out)
    }

    #[inline]
    pub fn encode_to_vec(&self, value: &Value) -> Result<Vec<u8>, SessionError> {
        self.session().encode_to_vec(value)
    }

    #[inline]
    pub fn decode(&self, stream: &mut RewindableStream<'_>) -> Decoded {
        self.session().decode(stream)
    }

    #[inline]
    pub fn decode_slice(&self, bytes: &[u8]) -> Decoded {
        self.session().decode_slice(bytes)
    }
}

// -----------------------------------------------------------------------------
// Session

/// One encode or decode with optional per-session state.
///
/// A [`DriverContext`] is leased for the duration of the call; a context
/// leased by another running session fails the call with
/// [`GraphError::ContextInUse`].
pub struct Session<'s> {
    codec: &'s Codec,
    context: Option<&'s DriverContext>,
    known: Option<&'s KnownObjects>,
}

impl<'s> Session<'s> {
    pub fn with_context(mut self, context: &'s DriverContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_known(mut self, known: &'s KnownObjects) -> Self {
        self.known = Some(known);
        self
    }

    fn lease(&self) -> Result<Option<ContextLease<'s>>, GraphError> {
        self.context.map(DriverContext::lease).transpose()
    }

    pub fn encode(&self, value: &Value, out: &mut dyn Write) -> Result<(), SessionError> {
        self.encode_inner(value, out)
            .map_err(|err| SessionError::new(Action::Encode, Pass::First, err))
    }

    pub fn encode_to_vec(&self, value: &Value) -> Result<Vec<u8>, SessionError> {
        let mut bytes = Vec::new();
        self.encode(value, &mut bytes)?;
        Ok(bytes)
    }

    fn encode_inner(&self, value: &Value, out: &mut dyn Write) -> Result<(), GraphError> {
        let _lease = self.lease()?;
        let options = &self.codec.options;
        let header = Header::current(options.endian, options.crlf);
        header.write(out)?;

        let drivers = self.codec.registry.drivers(self.context);
        let mut writer = GraphWriter::new(PrimWriter::new(out, options.endian), drivers, self.known, options);
        writer.write_graph(value)
    }

    /// Decodes one graph, restarting `stream` once if the first pass
    /// converted reference data to values.
    pub fn decode(&self, stream: &mut RewindableStream<'_>) -> Decoded {
        let mut mutations = MutationLog::default();
        let failed = |pass: Pass, err: GraphError| Decoded::failed(SessionError::new(Action::Decode, pass, err));

        let _lease = match self.lease() {
            Ok(lease) => lease,
            Err(err) => return failed(Pass::First, err),
        };

        let (header, value) = match self.decode_pass(stream, &mut mutations) {
            Ok(done) => done,
            Err(err) => return failed(Pass::First, err),
        };
        if !mutations.needs_restart() {
            return Decoded::ok(header, value, 0);
        }

        log::debug!(
            "{} reference objects were read as values, restarting the decode ({:?})",
            mutations.len(),
            stream.strategy()
        );
        mutations.begin_second_pass();
        if let Err(err) = stream.restart() {
            return failed(Pass::Second, err);
        }

        match self.decode_pass(stream, &mut mutations) {
            Ok((header, value)) => Decoded::ok(header, value, 1),
            Err(err) => failed(Pass::Second, err),
        }
    }

    pub fn decode_slice(&self, bytes: &[u8]) -> Decoded {
        let mut cursor = Cursor::new(bytes);
        match RewindableStream::seekable(&mut cursor) {
            Ok(mut stream) => self.decode(&mut stream),
            Err(err) => Decoded::failed(SessionError::new(Action::Decode, Pass::First, err.into())),
        }
    }

    fn decode_pass(
        &self,
        stream: &mut RewindableStream<'_>,
        mutations: &mut MutationLog,
    ) -> Result<(Header, Value), GraphError> {
        let header = Header::read(stream)?;
        let drivers = self.codec.registry.drivers(self.context);
        let mut reader = GraphReader::new(
            PrimReader::new(stream, header.endian()),
            drivers,
            self.known,
            self.codec.options.max_depth,
            mutations,
        );
        let value = reader.read_graph()?;
        if !reader.needs_restart() {
            reader.run_fixups()?;
        }
        Ok((header, value))
    }
}

// -----------------------------------------------------------------------------
// Decoded

/// Outcome of a decode.
///
/// Check [`is_valid`](Self::is_valid) before using the value; a failed decode
/// carries the fault instead.
#[derive(Debug)]
pub struct Decoded {
    value: Option<Value>,
    error: Option<SessionError>,
    header: Option<Header>,
    restarts: u8,
}

impl Decoded {
    fn ok(header: Header, value: Value, restarts: u8) -> Self {
        Self {
            value: Some(value),
            error: None,
            header: Some(header),
            restarts,
        }
    }

    fn failed(error: SessionError) -> Self {
        Self {
            value: None,
            restarts: u8::from(error.pass() == Pass::Second),
            error: Some(error),
            header: None,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    #[inline]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Result<Value, SessionError> {
        match (self.value, self.error) {
            (_, Some(error)) => Err(error),
            (Some(value), None) => Ok(value),
            (None, None) => Ok(Value::Null),
        }
    }

    #[inline]
    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    /// The error message, if the decode failed.
    pub fn message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// The stream header, if the decode got past it.
    #[inline]
    pub fn header(&self) -> Option<Header> {
        self.header
    }

    /// How often the stream was restarted: zero or one.
    #[inline]
    pub fn restarts(&self) -> u8 {
        self.restarts
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicUsize, Ordering};
    use std::io::Read;

    use super::*;
    use crate::descriptor::{Retarget, TypeReadInfo, TypeRename};
    use crate::driver::builtin::{EnumDriver, ObjectDriver};
    use crate::driver::{Driver, DriverQuery, DriverRegistryBuilder, Drivers, Semantics};
    use crate::object::{Body, EnumValue, Fields, ObjectRef, Prim, Record, Type};
    use crate::stream::RestartStrategy;

    fn node_type() -> Type {
        Type::sealed("app", "Node")
    }

    fn holder_type() -> Type {
        Type::sealed("app", "Holder")
    }

    fn node(name: &str) -> ObjectRef {
        ObjectRef::with_fields(
            node_type(),
            Fields::from_iter([("name", Value::from(name)), ("next", Value::Null)]),
        )
    }

    fn holder(fields: impl IntoIterator<Item = (&'static str, Value)>) -> Value {
        Value::Object(ObjectRef::with_fields(holder_type(), fields.into_iter().collect()))
    }

    fn codec(types: &[Type]) -> Codec {
        let mut builder = DriverRegistry::builder();
        for ty in types {
            builder = builder.register_type(ty.clone());
        }
        Codec::new(builder.build())
    }

    fn object(value: &Value) -> ObjectRef {
        value.as_object().cloned().unwrap()
    }

    // -------------------------------------------------------------------------
    // Round trips

    #[test]
    fn values_roundtrip() {
        let point = Type::value("geo", "Point");
        let codec = codec(core::slice::from_ref(&point));

        let values = [
            Value::Null,
            Value::from(true),
            Value::from('λ'),
            Value::from(-7_i8),
            Value::from(70_000_i32),
            Value::from(u64::MAX),
            Value::from(2.5_f64),
            Value::from("hello"),
            Value::Type(Type::list(Type::prim(Prim::I32))),
            Value::Record(Record::new(point).with("x", 1_i32).with("y", -2_i64)),
        ];
        for value in values {
            let bytes = codec.encode_to_vec(&value).unwrap();
            let decoded = codec.decode_slice(&bytes);
            assert!(decoded.is_valid(), "{:?}", decoded.message());
            assert_eq!(decoded.restarts(), 0);
            assert_eq!(decoded.into_value().unwrap(), value);
        }
    }

    #[test]
    fn containers_roundtrip() {
        let codec = codec(&[node_type()]);
        let strings = ObjectRef::with_items(
            Type::list(Type::prim(Prim::String)),
            vec![Value::from("a"), Value::Null, Value::from("c")],
        );
        let grid = ObjectRef::new(
            Type::array(Type::prim(Prim::F64), 2),
            Body::Grid {
                dims: vec![2, 3],
                items: (0..6).map(|i| Value::F64(f64::from(i))).collect(),
            },
        );
        let mixed = ObjectRef::with_items(
            Type::list(Type::object()),
            vec![Value::from(1_i32), Value::from("two"), Value::Object(node("three"))],
        );
        let root = ObjectRef::with_items(
            Type::list(Type::object()),
            vec![strings.into(), grid.into(), mixed.into()],
        );

        let bytes = codec.encode_to_vec(&Value::Object(root)).unwrap();
        let items = object(&codec.decode_slice(&bytes).into_value().unwrap()).items().unwrap();

        assert_eq!(
            object(&items[0]).items().unwrap(),
            [Value::from("a"), Value::Null, Value::from("c")]
        );

        let grid = object(&items[1]);
        assert_eq!(grid.ty(), &Type::array(Type::prim(Prim::F64), 2));
        match &*grid.body() {
            Body::Grid { dims, items } => {
                assert_eq!(dims, &[2, 3]);
                assert_eq!(items[5], Value::F64(5.0));
            }
            other => panic!("expected a grid, found {other:?}"),
        }

        let mixed = object(&items[2]).items().unwrap();
        assert_eq!(mixed[0], Value::from(1_i32));
        assert_eq!(mixed[1], Value::from("two"));
        assert_eq!(mixed[2].field("name"), Some(Value::from("three")));
    }

    // -------------------------------------------------------------------------
    // Identity

    #[test]
    fn shared_objects_stay_shared() {
        let codec = codec(&[node_type(), holder_type()]);
        let shared = node("shared");
        let marker = ObjectRef::empty(Type::object());
        let root = holder([
            ("a", shared.clone().into()),
            ("b", shared.into()),
            ("c", marker.clone().into()),
            ("d", marker.into()),
        ]);

        let bytes = codec.encode_to_vec(&root).unwrap();
        let root = codec.decode_slice(&bytes).into_value().unwrap();

        let field = |name| object(&root.field(name).unwrap());
        assert!(ObjectRef::ptr_eq(&field("a"), &field("b")));
        assert!(ObjectRef::ptr_eq(&field("c"), &field("d")));
        assert!(!ObjectRef::ptr_eq(&field("a"), &field("c")));
        assert_eq!(*field("c").body(), Body::Empty);
    }

    #[test]
    fn three_node_cycle() {
        let codec = codec(&[node_type()]);
        let top = node("Top");
        let below = node("Below");
        let cycle = node("Cycle");
        top.set_field("next", below.clone().into());
        below.set_field("next", cycle.clone().into());
        cycle.set_field("next", top.clone().into());

        let bytes = codec.encode_to_vec(&Value::Object(top.clone())).unwrap();
        top.set_field("next", Value::Null);

        let a = object(&codec.decode_slice(&bytes).into_value().unwrap());
        let d = object(&a.field("next").unwrap());
        let b = object(&d.field("next").unwrap());

        assert_eq!(a.field("name"), Some(Value::from("Top")));
        assert_eq!(d.field("name"), Some(Value::from("Below")));
        assert_eq!(b.field("name"), Some(Value::from("Cycle")));
        assert!(!ObjectRef::ptr_eq(&a, &d));
        assert!(!ObjectRef::ptr_eq(&d, &b));
        assert!(!ObjectRef::ptr_eq(&a, &b));
        assert!(ObjectRef::ptr_eq(&object(&b.field("next").unwrap()), &a));

        a.set_field("next", Value::Null);
    }

    #[test]
    fn known_objects_are_written_by_key() {
        let codec = codec(&[node_type(), holder_type()]);
        let origin = node("origin");
        let mut known = KnownObjects::new();
        known.register("origin", &origin).unwrap();

        let root = holder([("a", origin.clone().into()), ("b", origin.into())]);
        let bytes = codec.session().with_known(&known).encode_to_vec(&root).unwrap();

        let local = node("local origin");
        let mut local_known = KnownObjects::new();
        local_known.register("origin", &local).unwrap();
        let root = codec.session().with_known(&local_known).decode_slice(&bytes).into_value().unwrap();

        assert!(ObjectRef::ptr_eq(&object(&root.field("a").unwrap()), &local));
        assert!(ObjectRef::ptr_eq(&object(&root.field("b").unwrap()), &local));

        // Without the key the stream cannot be read.
        let decoded = codec.decode_slice(&bytes);
        assert!(matches!(decoded.error().unwrap().fault(), GraphError::InvalidData { .. }));
    }

    // -------------------------------------------------------------------------
    // Faults

    #[test]
    fn rejects_bad_headers() {
        let codec = codec(&[]);
        for bytes in [&[][..], &[9, 1], &[3], &[3, 0x80]] {
            let decoded = codec.decode_slice(bytes);
            assert!(!decoded.is_valid());
            assert!(decoded.header().is_none());
            assert!(matches!(decoded.error().unwrap().fault(), GraphError::InvalidHeader(_)));
        }
    }

    #[test]
    fn unknown_back_reference_is_invalid_data() {
        let decoded = codec(&[]).decode_slice(&[3, 1, 3, 5]);
        let error = decoded.error().unwrap();
        assert_eq!(error.action(), Action::Decode);
        assert!(matches!(error.fault(), GraphError::InvalidData { .. }));
        assert!(decoded.message().unwrap().starts_with("Failed to decode object graph: "));
    }

    #[test]
    fn unknown_known_key_is_invalid_data() {
        let bytes = [3, 1, 7, 0, 4, b'n', b'o', b'p', b'e'];
        let known = KnownObjects::new();
        let codec = codec(&[]);
        let decoded = codec.session().with_known(&known).decode_slice(&bytes);

        assert!(matches!(decoded.error().unwrap().fault(), GraphError::InvalidData { .. }));
        assert!(decoded.message().unwrap().contains("unknown known object `nope`"));
    }

    #[test]
    fn unregistered_type_fails_to_load() {
        let writer = codec(&[node_type()]);
        let bytes = writer.encode_to_vec(&Value::Object(node("lost"))).unwrap();

        let decoded = codec(&[]).decode_slice(&bytes);
        match decoded.error().unwrap().fault() {
            GraphError::TypeLoad(name) => assert_eq!(name, "app::Node"),
            other => panic!("expected a load fault, found {other:?}"),
        }
    }

    #[test]
    fn context_in_use() {
        let codec = codec(&[]);
        let context = DriverContext::new();
        let lease = context.lease().unwrap();

        let err = codec.session().with_context(&context).encode_to_vec(&Value::from(1_i32)).unwrap_err();
        assert!(matches!(err.fault(), GraphError::ContextInUse));
        assert!(err.is_fatal());

        drop(lease);
        let bytes = codec.session().with_context(&context).encode_to_vec(&Value::from(1_i32)).unwrap();
        assert!(codec.session().with_context(&context).decode_slice(&bytes).is_valid());
        assert!(!context.is_leased());
    }

    // -------------------------------------------------------------------------
    // Numeric conversions

    fn read_as_u8(value: i32) -> Decoded {
        let bytes = codec(&[]).encode_to_vec(&Value::from(value)).unwrap();
        let registry = DriverRegistry::builder()
            .hook(TypeRename::new("core::i32", Type::prim(Prim::U8)))
            .build();
        Codec::new(registry).decode_slice(&bytes)
    }

    #[test]
    fn narrowing_is_checked() {
        assert_eq!(read_as_u8(255).into_value().unwrap(), Value::U8(255));

        let decoded = read_as_u8(256);
        match decoded.error().unwrap().fault() {
            GraphError::Overflow { value, source_type, target_type } => {
                assert_eq!(value, "256");
                assert_eq!(source_type, "core::i32");
                assert_eq!(target_type, "core::u8");
            }
            other => panic!("expected an overflow, found {other:?}"),
        }
    }

    fn color(underlying: Prim) -> Type {
        Type::enumeration("app", "Color", underlying)
    }

    fn read_renumbered(raw: i128) -> Decoded {
        let writer = codec(&[color(Prim::I32)]);
        let bytes = writer
            .encode_to_vec(&Value::Enum(EnumValue::new(color(Prim::I32), raw)))
            .unwrap();

        let registry = DriverRegistry::builder()
            .hook(|info: &TypeReadInfo, retarget: &mut Retarget| {
                if info.path() == "app::Color" {
                    let driver = EnumDriver::new(color(Prim::U8))
                        .map(|driver| driver.with_renumber(|raw| (raw == 2).then_some(20)));
                    retarget.set_type(color(Prim::U8));
                    if let Some(driver) = driver {
                        retarget.set_driver(Arc::new(driver));
                    }
                }
            })
            .build();
        Codec::new(registry).decode_slice(&bytes)
    }

    #[test]
    fn enum_renumbered_into_narrower_type() {
        let value = read_renumbered(2).into_value().unwrap();
        assert_eq!(value, Value::Enum(EnumValue::new(color(Prim::U8), 20)));
    }

    #[test]
    fn enum_out_of_range_overflows() {
        let decoded = read_renumbered(300);
        assert!(matches!(decoded.error().unwrap().fault(), GraphError::Overflow { .. }));
    }

    // -------------------------------------------------------------------------
    // Schema changes

    #[test]
    fn list_read_as_array() {
        let list = ObjectRef::with_items(
            Type::list(Type::prim(Prim::I32)),
            vec![1_i32.into(), 2_i32.into(), 3_i32.into()],
        );
        let bytes = codec(&[]).encode_to_vec(&Value::Object(list)).unwrap();

        let array = Type::array(Type::prim(Prim::I32), 1);
        let target = array.clone();
        let registry = DriverRegistry::builder()
            .hook(move |info: &TypeReadInfo, retarget: &mut Retarget| {
                if info.path() == "alloc::vec::Vec" {
                    retarget.set_type(target.clone());
                }
            })
            .build();
        let decoded = object(&Codec::new(registry).decode_slice(&bytes).into_value().unwrap());

        assert_eq!(decoded.ty(), &array);
        assert_eq!(decoded.items().unwrap(), [Value::from(1_i32), Value::from(2_i32), Value::from(3_i32)]);
    }

    /// Writes a vector as two raw floats.
    struct Vec2Driver;

    impl Driver for Vec2Driver {
        fn name(&self) -> &str {
            "geo::Vec2"
        }

        fn version(&self) -> i32 {
            2
        }

        fn semantics(&self) -> Semantics {
            Semantics::Value
        }

        fn write(&self, writer: &mut GraphWriter<'_>, value: &Value) -> Result<(), GraphError> {
            let record = value.as_record().ok_or_else(|| GraphError::custom("expected a record"))?;
            for axis in ["x", "y"] {
                let v = record.field(axis).and_then(Value::as_f64).unwrap_or_default();
                writer.prim().write_f64(v)?;
            }
            Ok(())
        }
    }

    /// Reads what [`Vec2Driver`] writes into a reference object.
    struct Vec2RefDriver;

    impl Driver for Vec2RefDriver {
        fn name(&self) -> &str {
            "geo::Vec2Ref"
        }

        fn semantics(&self) -> Semantics {
            Semantics::Reference
        }

        fn write(&self, writer: &mut GraphWriter<'_>, value: &Value) -> Result<(), GraphError> {
            for axis in ["x", "y"] {
                let v = value.field(axis).and_then(|v| v.as_f64()).unwrap_or_default();
                writer.prim().write_f64(v)?;
            }
            Ok(())
        }

        fn create(&self, reader: &mut GraphReader<'_>, info: &TypeReadInfo) -> Result<ObjectRef, GraphError> {
            Ok(ObjectRef::placeholder(reader.target_type(info)?))
        }

        fn fill(
            &self,
            reader: &mut GraphReader<'_>,
            _: &TypeReadInfo,
            object: &ObjectRef,
        ) -> Result<(), GraphError> {
            let x = reader.prim().read_f64()?;
            let y = reader.prim().read_f64()?;
            object.fill(Body::Fields(Fields::from_iter([("x", Value::F64(x)), ("y", Value::F64(y))])));
            Ok(())
        }
    }

    #[test]
    fn versioned_value_read_as_reference() {
        let vec2 = Type::value("geo", "Vec2");
        let writer = Codec::new(
            DriverRegistry::builder()
                .register_type(vec2.clone())
                .resolver(|query: &DriverQuery<'_>, _: &Drivers<'_>| -> Option<Arc<dyn Driver>> {
                    (query.ty().path() == "geo::Vec2").then(|| Arc::new(Vec2Driver) as Arc<dyn Driver>)
                })
                .build(),
        );
        let value = Value::Record(Record::new(vec2).with("x", 1.5_f64).with("y", -2.0_f64));
        let bytes = writer.encode_to_vec(&value).unwrap();

        let vec2_ref = Type::sealed("geo", "Vec2Ref");
        let target = vec2_ref.clone();
        let reader = Codec::new(
            DriverRegistry::builder()
                .driver(Arc::new(Vec2RefDriver))
                .hook(move |info: &TypeReadInfo, retarget: &mut Retarget| {
                    if info.driver_name() == Some("geo::Vec2") && info.version() == 2 {
                        retarget.set_type(target.clone());
                        retarget.set_driver_name("geo::Vec2Ref");
                    }
                })
                .build(),
        );
        let decoded = reader.decode_slice(&bytes);
        assert_eq!(decoded.restarts(), 0);

        let object = object(&decoded.into_value().unwrap());
        assert_eq!(object.ty(), &vec2_ref);
        assert_eq!(object.field("x"), Some(Value::F64(1.5)));
        assert_eq!(object.field("y"), Some(Value::F64(-2.0)));
    }

    // -------------------------------------------------------------------------
    // Reference to value conversion

    fn point_value() -> Type {
        Type::value("geo", "PointValue")
    }

    /// A holder whose two fields share one `geo::Point` reference object.
    fn shared_point_bytes() -> Vec<u8> {
        let point = Type::sealed("geo", "Point");
        let writer = codec(&[holder_type(), point.clone()]);
        let shared = ObjectRef::with_fields(point, Fields::from_iter([("x", 3_i32.into()), ("y", 4_i32.into())]));
        let root = holder([("a", shared.clone().into()), ("b", shared.into())]);
        writer.encode_to_vec(&root).unwrap()
    }

    fn point_as_value() -> Codec {
        Codec::new(
            DriverRegistry::builder()
                .register_type(holder_type())
                .register_type(point_value())
                .hook(TypeRename::new("geo::Point", point_value()))
                .build(),
        )
    }

    fn assert_points(root: &Value) {
        let expected = Value::Record(Record::new(point_value()).with("x", 3_i32).with("y", 4_i32));
        assert_eq!(root.field("a"), Some(expected.clone()));
        assert_eq!(root.field("b"), Some(expected));
    }

    #[test]
    fn reference_read_as_value_restarts_once() {
        let bytes = shared_point_bytes();
        let decoded = point_as_value().decode_slice(&bytes);

        assert!(decoded.is_valid(), "{:?}", decoded.message());
        assert_eq!(decoded.restarts(), 1);
        assert_points(&decoded.into_value().unwrap());
    }

    #[test]
    fn every_restart_strategy() {
        let bytes = shared_point_bytes();
        let codec = point_as_value();

        let mut input = &bytes[..];
        let mut stream = RewindableStream::tee(&mut input).unwrap();
        let decoded = codec.decode(&mut stream);
        assert_eq!(stream.strategy(), RestartStrategy::Tee);
        assert_eq!(decoded.restarts(), 1);
        assert_points(&decoded.into_value().unwrap());

        let mut packed = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
        packed.write_all(&bytes).unwrap();
        let mut base = Cursor::new(packed.finish().unwrap());
        let mut stream = RewindableStream::recreate(&mut base, |base| {
            Ok(Box::new(flate2::read::GzDecoder::new(base)) as Box<dyn Read + '_>)
        })
        .unwrap();
        let decoded = codec.decode(&mut stream);
        assert_eq!(stream.strategy(), RestartStrategy::Recreate);
        assert_eq!(decoded.restarts(), 1);
        assert_points(&decoded.into_value().unwrap());
    }

    /// A value driver that refuses reference data.
    struct StrictDriver;

    impl Driver for StrictDriver {
        fn name(&self) -> &str {
            "geo::Strict"
        }

        fn semantics(&self) -> Semantics {
            Semantics::Value
        }

        fn reference_fallback(&self) -> bool {
            false
        }

        fn write(&self, _: &mut GraphWriter<'_>, _: &Value) -> Result<(), GraphError> {
            Ok(())
        }
    }

    #[test]
    fn conversion_without_fallback_is_fatal() {
        let bytes = shared_point_bytes();
        let codec = Codec::new(
            DriverRegistry::builder()
                .register_type(holder_type())
                .hook(|info: &TypeReadInfo, retarget: &mut Retarget| {
                    if info.path() == "geo::Point" {
                        retarget.set_driver(Arc::new(StrictDriver));
                    }
                })
                .build(),
        );

        let error = codec.decode_slice(&bytes).into_value().unwrap_err();
        assert!(matches!(error.fault(), GraphError::MutationConflict(_)));
        assert!(error.is_fatal());
    }

    // -------------------------------------------------------------------------
    // Fixups

    static FIXUPS: AtomicUsize = AtomicUsize::new(0);

    /// Object driver that marks its objects once the graph is complete.
    struct MarkingDriver(ObjectDriver);

    impl Driver for MarkingDriver {
        fn name(&self) -> &str {
            "app::Marked"
        }

        fn semantics(&self) -> Semantics {
            Semantics::Reference
        }

        fn write(&self, writer: &mut GraphWriter<'_>, value: &Value) -> Result<(), GraphError> {
            self.0.write(writer, value)
        }

        fn create(&self, reader: &mut GraphReader<'_>, info: &TypeReadInfo) -> Result<ObjectRef, GraphError> {
            self.0.create(reader, info)
        }

        fn fill(
            &self,
            reader: &mut GraphReader<'_>,
            info: &TypeReadInfo,
            object: &ObjectRef,
        ) -> Result<(), GraphError> {
            self.0.fill(reader, info, object)?;
            let object = object.clone();
            reader.add_fixup(move || {
                FIXUPS.fetch_add(1, Ordering::SeqCst);
                if object.field("fail") == Some(Value::Bool(true)) {
                    return Err(GraphError::custom("the object refused its fixup"));
                }
                object.set_field("marked", Value::Bool(true));
                Ok(())
            });
            Ok(())
        }
    }

    fn marking(builder: DriverRegistryBuilder) -> Arc<DriverRegistry> {
        builder
            .register_type(Type::sealed("app", "Marked"))
            .resolver(|query: &DriverQuery<'_>, _: &Drivers<'_>| -> Option<Arc<dyn Driver>> {
                let ty = query.ty();
                if ty.path() != "app::Marked" {
                    return None;
                }
                Some(Arc::new(MarkingDriver(ObjectDriver::new(ty.clone()))))
            })
            .build()
    }

    #[test]
    fn fixups_run_after_the_final_pass() {
        let point = Type::sealed("geo", "Point");
        let writer = Codec::new(marking(
            DriverRegistry::builder().register_type(holder_type()).register_type(point.clone()),
        ));
        let shared = ObjectRef::with_fields(point, Fields::from_iter([("x", 3_i32.into()), ("y", 4_i32.into())]));
        let marked = ObjectRef::with_fields(Type::sealed("app", "Marked"), Fields::new());
        let failing = ObjectRef::with_fields(
            Type::sealed("app", "Marked"),
            Fields::from_iter([("fail", Value::Bool(true))]),
        );

        let good = holder([("a", shared.clone().into()), ("b", shared.into()), ("m", marked.into())]);
        let good = writer.encode_to_vec(&good).unwrap();
        let bad = writer.encode_to_vec(&holder([("m", failing.into())])).unwrap();

        let reader = Codec::new(marking(
            DriverRegistry::builder()
                .register_type(holder_type())
                .register_type(point_value())
                .hook(TypeRename::new("geo::Point", point_value())),
        ));

        let before = FIXUPS.load(Ordering::SeqCst);
        let decoded = reader.decode_slice(&good);
        assert_eq!(decoded.restarts(), 1);
        assert_eq!(FIXUPS.load(Ordering::SeqCst) - before, 1);
        let root = decoded.into_value().unwrap();
        assert_points(&root);
        assert_eq!(root.field("m").unwrap().field("marked"), Some(Value::Bool(true)));

        let decoded = reader.decode_slice(&bad);
        assert!(!decoded.is_valid());
        assert!(decoded.message().unwrap().contains("the object refused its fixup"));
    }
}
