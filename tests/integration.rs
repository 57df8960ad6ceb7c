//! Integration tests for protoc-gen-strata
//!
//! These tests exercise the full code generation pipeline.

use prost::Message;
use prost_types::compiler::{CodeGeneratorRequest, CodeGeneratorResponse};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::uninterpreted_option::NamePart;
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FieldOptions, FileDescriptorProto, FileOptions, MessageOptions, MethodDescriptorProto,
    MethodOptions, OneofDescriptorProto, ServiceDescriptorProto, UninterpretedOption,
};
use protoc_gen_strata::GeneratorError;

fn option(extension: &str, aggregate: &str) -> UninterpretedOption {
    UninterpretedOption {
        name: vec![NamePart {
            name_part: extension.to_string(),
            is_extension: true,
        }],
        aggregate_value: Some(aggregate.to_string()),
        ..Default::default()
    }
}

fn field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional.into()),
        r#type: Some(ty.into()),
        ..Default::default()
    }
}

fn typed(name: &str, number: i32, ty: Type, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(type_name.to_string()),
        ..field(name, number, ty)
    }
}

fn repeated(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        label: Some(Label::Repeated.into()),
        ..field(name, number, ty)
    }
}

fn annotated(mut f: FieldDescriptorProto, aggregate: &str) -> FieldDescriptorProto {
    f.options = Some(FieldOptions {
        uninterpreted_option: vec![option("strata.field", aggregate)],
        ..Default::default()
    });
    f
}

fn message(name: &str, field: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field,
        ..Default::default()
    }
}

fn enumeration(name: &str, values: &[&str]) -> EnumDescriptorProto {
    EnumDescriptorProto {
        name: Some(name.to_string()),
        value: values
            .iter()
            .enumerate()
            .map(|(i, v)| EnumValueDescriptorProto {
                name: Some(v.to_string()),
                number: Some(i as i32),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

fn proto_file(
    name: &str,
    package: &str,
    go_package: &str,
    message_type: Vec<DescriptorProto>,
) -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(name.to_string()),
        package: Some(package.to_string()),
        message_type,
        syntax: Some("proto3".to_string()),
        options: Some(FileOptions {
            go_package: Some(go_package.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn user_wire() -> DescriptorProto {
    message(
        "UserWire",
        vec![
            field("id", 1, Type::String),
            typed("created_at", 2, Type::Message, ".google.protobuf.Timestamp"),
            typed("role", 3, Type::Enum, ".acme.EnumRole"),
        ],
    )
}

fn user_file(messages: Vec<DescriptorProto>) -> FileDescriptorProto {
    let mut file = proto_file("acme/user.proto", "acme", "github.com/acme/gen/acme", messages);
    file.enum_type = vec![enumeration(
        "EnumRole",
        &["ENUM_ROLE_UNSPECIFIED", "ENUM_ROLE_ADMIN"],
    )];
    file
}

fn request_for(files: Vec<FileDescriptorProto>, parameter: Option<&str>) -> CodeGeneratorRequest {
    CodeGeneratorRequest {
        file_to_generate: vec![files[0].name().to_string()],
        parameter: parameter.map(str::to_string),
        proto_file: files,
        ..Default::default()
    }
}

fn content<'r>(response: &'r CodeGeneratorResponse, name: &str) -> &'r str {
    response
        .file
        .iter()
        .find(|f| f.name() == name)
        .unwrap_or_else(|| {
            let names: Vec<&str> = response.file.iter().map(|f| f.name()).collect();
            panic!("{} was not generated, got {:?}", name, names)
        })
        .content()
}

fn file_names(response: &CodeGeneratorResponse) -> Vec<&str> {
    response.file.iter().map(|f| f.name()).collect()
}

#[test]
fn test_generate_user_layers() {
    let request = request_for(vec![user_file(vec![user_wire()])], None);
    let response = protoc_gen_strata::generate(request).unwrap();

    assert!(response.error.is_none());
    assert_eq!(response.supported_features, Some(1));
    assert_eq!(
        file_names(&response),
        vec![
            "acme/user.enum.strata.go",
            "acme/user.domain.strata.go",
            "acme/user.domain_convert.strata.go",
            "acme/user.outbound.strata.go",
        ]
    );

    let domain = content(&response, "acme/user.domain.strata.go");
    assert!(domain.starts_with("// Code generated by protoc-gen-strata. DO NOT EDIT."));
    assert!(domain.contains("package acme\n"));
    assert!(domain.contains("import (\n\t\"time\"\n)"));
    assert!(!domain.contains("timestamppb"));
    assert!(domain.contains("type UserDomain struct {"));
    assert!(domain.contains("CreatedAt time.Time"));
    assert!(domain
        .lines()
        .any(|l| l.trim_start().starts_with("Role ") && l.contains(" string ")));
    assert!(domain.contains(r#"json:"created_at,omitempty""#));

    let convert = content(&response, "acme/user.domain_convert.strata.go");
    assert!(convert.contains("func (w *UserWire) IntoDomain() *UserDomain {"));
    assert!(convert.contains("EnumRoleToString(w.Role)"));
    assert!(convert.contains("func (d *UserDomain) IntoWire() *UserWire {"));
    assert!(convert.contains("EnumRoleFromString(d.Role)"));

    let enums = content(&response, "acme/user.enum.strata.go");
    assert!(enums.contains("func EnumRoleToString(v EnumRole) string {"));
    assert!(enums.contains("return EnumRole(EnumRole_value[s])"));

    let outbound = content(&response, "acme/user.outbound.strata.go");
    assert!(outbound.contains("type UserOutbound struct {"));
    assert!(outbound.contains("func (w *UserWire) IntoOutboundOrNil() *UserOutbound {"));
}

#[test]
fn test_skip_message_without_suffix() {
    let request = request_for(
        vec![proto_file(
            "acme/misc.proto",
            "acme",
            "github.com/acme/gen/acme",
            vec![message("Settings", vec![field("name", 1, Type::String)])],
        )],
        None,
    );
    let response = protoc_gen_strata::generate(request).unwrap();
    assert!(response.file.is_empty());
}

#[test]
fn test_cross_module_import_is_deterministic() {
    let common = proto_file(
        "acme/common/address.proto",
        "acme.common",
        "github.com/acme/gen/common;commonv1",
        vec![message("AddressWire", vec![field("city", 1, Type::String)])],
    );
    let user = proto_file(
        "acme/user.proto",
        "acme",
        "github.com/acme/gen/acme",
        vec![message(
            "UserWire",
            vec![
                typed("home", 1, Type::Message, ".acme.common.AddressWire"),
                typed("work", 2, Type::Message, ".acme.common.AddressWire"),
            ],
        )],
    );

    let first = protoc_gen_strata::generate(request_for(vec![user.clone(), common.clone()], None))
        .unwrap();
    let domain = content(&first, "acme/user.domain.strata.go");
    assert_eq!(
        domain
            .matches(r#"commonv1 "github.com/acme/gen/common""#)
            .count(),
        1
    );
    assert!(domain.contains("*commonv1.AddressDomain"));

    let second = protoc_gen_strata::generate(request_for(vec![user, common], None)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_bitflag_outbound() {
    let mut user = user_wire();
    user.field.push(annotated(
        field("perms", 4, Type::Uint64),
        r#"outbound { bitflag { enum: "Permission" } }"#,
    ));
    let mut file = user_file(vec![user]);
    file.enum_type
        .push(enumeration("Permission", &["PERMISSION_NONE", "PERMISSION_READ"]));

    let response = protoc_gen_strata::generate(request_for(vec![file], None)).unwrap();
    let outbound = content(&response, "acme/user.outbound.strata.go");
    assert!(outbound.contains("\"github.com/strata-dev/strata/runtime/convert\""));
    assert!(outbound
        .lines()
        .any(|l| l.trim_start().starts_with("Perms ") && l.contains("[]string")));
    assert!(outbound.contains(r#"convert.BitflagToStrings(w.Perms, Permission_name, "PERMISSION_")"#));
}

#[test]
fn test_bitflag_requires_uint64() {
    let mut user = user_wire();
    user.field.push(annotated(
        field("perms", 4, Type::String),
        r#"outbound { bitflag { enum: "Permission" } }"#,
    ));

    let err = protoc_gen_strata::generate(request_for(vec![user_file(vec![user])], None))
        .unwrap_err();
    assert!(matches!(err, GeneratorError::Annotation { .. }), "{:?}", err);
}

fn create_user_request(email_rules: &str) -> CodeGeneratorRequest {
    let create = message(
        "CreateUserRequest",
        vec![
            field("kind", 1, Type::String),
            annotated(field("email", 2, Type::String), email_rules),
            annotated(
                repeated("tags", 3, Type::String),
                "validate { dive: true min_len: 1 max_len: 16 }",
            ),
        ],
    );
    request_for(vec![user_file(vec![user_wire(), create])], None)
}

#[test]
fn test_inbound_validation() {
    let request = create_user_request(
        r#"validate { required_if { all: [{ field: "kind", value: "admin" }] } min_len: 3 }"#,
    );
    let response = protoc_gen_strata::generate(request).unwrap();

    let inbound = content(&response, "acme/user.inbound.strata.go");
    assert!(inbound.contains("type CreateUserInbound struct {"));
    assert!(inbound.contains("\tvalidation \"github.com/go-ozzo/ozzo-validation/v4\""));
    assert!(inbound.contains("return validation.ValidateStruct(in,"));
    assert!(inbound.contains(
        r#"validation.Field(&in.Email, validation.Required.When(in.Kind == "admin"), validation.Length(3, 0)),"#
    ));
    assert!(inbound.contains(
        "validation.Field(&in.Tags, validation.Each(validation.Length(1, 16))),"
    ));
    assert!(inbound.contains("func (in *CreateUserInbound) IntoWireInput() *CreateUserRequest {"));
}

#[test]
fn test_presence_rules_are_exclusive() {
    let request = create_user_request(
        r#"validate { required: true required_with { all: [{ field: "kind" }] } }"#,
    );
    let err = protoc_gen_strata::generate(request).unwrap_err();
    match err {
        GeneratorError::Annotation { reason, .. } => {
            assert!(reason.contains("more than one presence rule"), "{}", reason)
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_dive_requires_repeated_field() {
    let request = create_user_request("validate { dive: true min_len: 1 }");
    let err = protoc_gen_strata::generate(request).unwrap_err();
    assert!(matches!(err, GeneratorError::Annotation { .. }), "{:?}", err);
}

fn service_file(path: &str, headers: &str) -> FileDescriptorProto {
    let get = message(
        "GetUserRequest",
        vec![
            field("id", 1, Type::String),
            field("verbose", 2, Type::Bool),
            field("trace_id", 3, Type::String),
        ],
    );
    let mut file = user_file(vec![user_wire(), get]);
    file.service = vec![ServiceDescriptorProto {
        name: Some("Users".to_string()),
        method: vec![MethodDescriptorProto {
            name: Some("GetUser".to_string()),
            input_type: Some(".acme.GetUserRequest".to_string()),
            output_type: Some(".acme.UserWire".to_string()),
            options: Some(MethodOptions {
                uninterpreted_option: vec![option(
                    "strata.method",
                    &format!(
                        r#"endpoint {{ method: "GET" path: "{}" headers: [{}] }} auth {{ mode: BEARER }}"#,
                        path, headers
                    ),
                )],
                ..Default::default()
            }),
            ..Default::default()
        }],
        ..Default::default()
    }];
    file
}

#[test]
fn test_generate_http_bindings() {
    let file = service_file("/v1/users/{id}", r#""trace_id""#);
    let response = protoc_gen_strata::generate(request_for(vec![file], None)).unwrap();

    let http = content(&response, "acme/user.http.strata.go");
    assert!(http.contains("\t\"net/http\"\n"));
    assert!(http.contains(r#"const GetUserPattern = "GET /v1/users/{id}""#));
    assert!(http.contains(r#"const GetUserAuth = "bearer""#));
    assert!(http.contains("func DecodeGetUser(r *http.Request) (*GetUserInbound, error) {"));
    assert!(http.contains(r#"convert.Parse(&in.Id, r.PathValue("id"))"#));
    assert!(http.contains(r#"convert.Parse(&in.Verbose, r.URL.Query().Get("verbose"))"#));
    assert!(http.contains(r#"convert.Parse(&in.TraceId, r.Header.Get("Trace-Id"))"#));
}

#[test]
fn test_http_binding_rejects_unknown_path_parameter() {
    let file = service_file("/v1/users/{user_id}", "");
    let err = protoc_gen_strata::generate(request_for(vec![file], None)).unwrap_err();
    match err {
        GeneratorError::Schema { reason, .. } => {
            assert!(reason.contains("user_id"), "{}", reason)
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_http_binding_rejects_unknown_header() {
    let file = service_file("/v1/users/{id}", r#""x_request_id""#);
    let err = protoc_gen_strata::generate(request_for(vec![file], None)).unwrap_err();
    assert!(matches!(err, GeneratorError::Schema { .. }), "{:?}", err);
}

#[test]
fn test_fixtures_need_non_strict_mode() {
    let strict = protoc_gen_strata::generate(request_for(
        vec![user_file(vec![user_wire()])],
        Some("addons=fixtures"),
    ))
    .unwrap();
    assert!(!file_names(&strict).contains(&"acme/user.fixtures.strata_test.go"));

    let relaxed = protoc_gen_strata::generate(request_for(
        vec![user_file(vec![user_wire()])],
        Some("addons=fixtures,strict=false"),
    ))
    .unwrap();
    let fixtures = content(&relaxed, "acme/user.fixtures.strata_test.go");
    assert!(fixtures.contains("package acme_test\n"));
    assert!(fixtures.contains("\t\"github.com/acme/gen/acme\"\n"));
    assert!(fixtures.contains(
        "func NewUserDomain(id string, createdAt time.Time, role string) *acme.UserDomain {"
    ));
}

#[test]
fn test_rust_addon() {
    let response = protoc_gen_strata::generate(request_for(
        vec![user_file(vec![user_wire()])],
        Some("addons=rust"),
    ))
    .unwrap();

    let rust = content(&response, "acme/user_domain.rs");
    assert!(rust.contains("pub struct UserDomain {"));
    assert!(rust.contains("pub id: String,"));
    assert!(rust.contains(r#"#[serde(rename = "created_at", default)]"#));
}

#[test]
fn test_document_database_tags() {
    let mut user = user_wire();
    user.options = Some(MessageOptions {
        uninterpreted_option: vec![option(
            "strata.message",
            r#"custom_code: "func (d *UserDomain) IsAdmin() bool { return d.Role == \"ENUM_ROLE_ADMIN\" }""#,
        )],
        ..Default::default()
    });

    let response =
        protoc_gen_strata::generate(request_for(vec![user_file(vec![user])], Some("db=mongo")))
            .unwrap();
    let domain = content(&response, "acme/user.domain.strata.go");
    assert!(domain.contains(r#"bson:"_id,omitempty""#));
    assert!(domain.contains("func (d *UserDomain) IsAdmin() bool"));
}

#[test]
fn test_oneof_members_are_skipped() {
    let mut user = user_wire();
    let mut nickname = field("nickname", 4, Type::String);
    nickname.oneof_index = Some(0);
    user.field.push(nickname);
    user.oneof_decl = vec![OneofDescriptorProto {
        name: Some("alias".to_string()),
        ..Default::default()
    }];

    let response =
        protoc_gen_strata::generate(request_for(vec![user_file(vec![user])], None)).unwrap();
    let domain = content(&response, "acme/user.domain.strata.go");
    assert!(!domain.contains("Nickname"));
}

#[test]
fn test_invalid_parameter() {
    let err = protoc_gen_strata::generate(request_for(
        vec![user_file(vec![user_wire()])],
        Some("addons=plugin.so"),
    ))
    .unwrap_err();
    assert!(matches!(err, GeneratorError::InvalidConfig(_)), "{:?}", err);

    let err = protoc_gen_strata::generate(request_for(
        vec![user_file(vec![user_wire()])],
        Some("strict=maybe"),
    ))
    .unwrap_err();
    assert!(matches!(err, GeneratorError::InvalidConfig(_)), "{:?}", err);
}

#[test]
fn test_generate_from_bytes() {
    let file = proto_file(
        "acme/account.proto",
        "acme",
        "github.com/acme/gen/acme",
        vec![message(
            "AccountWire",
            vec![field("id", 1, Type::String), field("balance", 2, Type::Int64)],
        )],
    );
    let bytes = request_for(vec![file], None).encode_to_vec();

    let response = protoc_gen_strata::generate_from_bytes(&bytes).unwrap();
    let domain = content(&response, "acme/account.domain.strata.go");
    assert!(domain.contains("type AccountDomain struct {"));
    assert!(domain.contains("Balance int64"));
}

#[test]
fn test_reference_to_hidden_message() {
    let mut secret = message("SecretWire", vec![field("token", 1, Type::String)]);
    secret.options = Some(MessageOptions {
        uninterpreted_option: vec![option("strata.message", "outbound { hide: true }")],
        ..Default::default()
    });
    let mut user = user_wire();
    user.field
        .push(typed("secret", 4, Type::Message, ".acme.SecretWire"));

    let files = vec![user_file(vec![user.clone(), secret.clone()])];
    let err = protoc_gen_strata::generate(request_for(files, None)).unwrap_err();
    assert!(matches!(err, GeneratorError::Schema { .. }), "{:?}", err);

    let last = user.field.len() - 1;
    user.field[last] = annotated(user.field[last].clone(), "outbound { hide: true }");
    let response =
        protoc_gen_strata::generate(request_for(vec![user_file(vec![user, secret])], None))
            .unwrap();
    let outbound = content(&response, "acme/user.outbound.strata.go");
    assert!(outbound.contains("type UserOutbound struct {"));
    assert!(!outbound.contains("SecretOutbound"));
}

#[test]
fn test_custom_tags() {
    let mut user = user_wire();
    user.field[0] = annotated(
        field("id", 1, Type::String),
        r#"domain { name: "user_id" } tags { name: "xml" value: "id" }"#,
    );
    let response =
        protoc_gen_strata::generate(request_for(vec![user_file(vec![user.clone()])], None))
            .unwrap();
    let domain = content(&response, "acme/user.domain.strata.go");
    assert!(domain.contains(r#"`json:"user_id,omitempty" xml:"id"`"#));
    assert!(domain.lines().any(|l| l.trim_start().starts_with("UserId ")));

    user.field[0] = annotated(field("id", 1, Type::String), r#"tags { name: "json" value: "x" }"#);
    let err = protoc_gen_strata::generate(request_for(vec![user_file(vec![user])], None))
        .unwrap_err();
    assert!(matches!(err, GeneratorError::Annotation { .. }), "{:?}", err);
}

#[test]
fn test_wire_field_names_follow_protoc_gen_go() {
    let mut user = user_wire();
    user.field.push(field("address_1", 4, Type::String));
    user.field.push(field("userID", 5, Type::String));

    let response =
        protoc_gen_strata::generate(request_for(vec![user_file(vec![user])], None)).unwrap();
    let convert = content(&response, "acme/user.domain_convert.strata.go");
    assert!(convert.contains("w.Address_1,"));
    assert!(convert.contains("w.UserID,"));
    assert!(convert.contains("d.Address_1,"));
    assert!(!convert.contains("w.Address1"));
    assert!(!convert.contains("w.UserId"));
}

#[test]
fn test_colliding_go_package_names_are_aliased() {
    let billing = proto_file(
        "billing/common/money.proto",
        "billing.common",
        "github.com/acme/gen/billing/common;common",
        vec![message("MoneyWire", vec![field("units", 1, Type::Int64)])],
    );
    let shipping = proto_file(
        "shipping/common/rate.proto",
        "shipping.common",
        "github.com/acme/gen/shipping/common/v1;common",
        vec![message("RateWire", vec![field("cents", 1, Type::Int64)])],
    );
    let order = proto_file(
        "acme/order.proto",
        "acme",
        "github.com/acme/gen/acme",
        vec![message(
            "OrderWire",
            vec![
                typed("total", 1, Type::Message, ".billing.common.MoneyWire"),
                typed("shipping", 2, Type::Message, ".shipping.common.RateWire"),
            ],
        )],
    );

    let response =
        protoc_gen_strata::generate(request_for(vec![order, billing, shipping], None)).unwrap();
    let domain = content(&response, "acme/order.domain.strata.go");
    assert!(domain.contains(r#"billingcommon "github.com/acme/gen/billing/common""#));
    assert!(domain.contains(r#"shippingcommon "github.com/acme/gen/shipping/common/v1""#));
    assert!(domain.contains("*billingcommon.MoneyDomain"));
    assert!(domain.contains("*shippingcommon.RateDomain"));
    assert!(!domain.contains("*common."));
}

#[test]
fn test_reference_without_layer_form() {
    let settings = message("Settings", vec![field("theme", 1, Type::String)]);
    let mut user = user_wire();
    user.field
        .push(typed("settings", 4, Type::Message, ".acme.Settings"));
    let err = protoc_gen_strata::generate(request_for(
        vec![user_file(vec![user, settings])],
        None,
    ))
    .unwrap_err();
    assert!(matches!(err, GeneratorError::Schema { .. }), "{:?}", err);
    assert!(err.to_string().contains("references Settings"), "{}", err);

    let profile = message("ProfileResponse", vec![field("bio", 1, Type::String)]);
    let mut user = user_wire();
    user.field
        .push(typed("profile", 4, Type::Message, ".acme.ProfileResponse"));
    let err = protoc_gen_strata::generate(request_for(
        vec![user_file(vec![user, profile])],
        None,
    ))
    .unwrap_err();
    assert!(matches!(err, GeneratorError::Schema { .. }), "{:?}", err);
}
