//! Unit tests for the rewrite traversal

#[cfg(test)]
mod rewrite_tests {
    use crate::classify::CallPattern;
    use crate::parser::parse_source;
    use crate::report::{ConversionRecord, FileReport, SkipRecord};
    use crate::rewrite::rewrite_module;
    use pretty_assertions::assert_eq;
    use swc_common::{sync::Lrc, SourceMap};
    use swc_ecma_ast::{Decl, Expr, ModuleItem, Stmt};

    struct Rewritten {
        code: String,
        rewritten: usize,
        report: FileReport,
    }

    fn rewrite_with(src: &str, filename: &str, pattern: &CallPattern) -> Rewritten {
        let cm: Lrc<SourceMap> = Default::default();
        let mut parsed = parse_source(src, &cm, filename).unwrap();
        let outcome = rewrite_module(&mut parsed, src, &cm, pattern);
        let report = outcome.recorder.into_report(filename);
        Rewritten {
            code: outcome.splice.apply(src),
            rewritten: outcome.rewritten,
            report,
        }
    }

    fn rewrite(src: &str) -> Rewritten {
        rewrite_with(src, "test.js", &CallPattern::default())
    }

    fn conversion(name: &str, kind: &str, start: &str, end: &str) -> ConversionRecord {
        ConversionRecord {
            name: name.to_string(),
            kind: kind.to_string(),
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    fn skip(start: &str, end: &str) -> SkipRecord {
        SkipRecord {
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    #[test]
    fn test_arrow_bound_to_variable() {
        let src = "const greet = () => {\n  Promise.await(load());\n};\n";
        let out = rewrite(src);

        assert_eq!(out.code, "const greet = async () => {\n  await Promise.await(load());\n};\n");
        assert_eq!(out.rewritten, 1);
        assert_eq!(
            out.report.converted_functions,
            vec![conversion("greet", "ArrowFunctionExpression", "1:14", "3:1")]
        );
        assert!(out.report.ignored_promise_awaits.is_empty());
    }

    #[test]
    fn test_function_declaration_is_anonymous() {
        let src = "function load(id) {\n  return Promise.await(fetch(id));\n}\n";
        let out = rewrite(src);

        // A declaration has no key and initializes no binding
        assert_eq!(out.code, src);
        assert_eq!(out.rewritten, 0);
        assert!(out.report.converted_functions.is_empty());
        assert_eq!(out.report.ignored_promise_awaits, vec![skip("1:0", "3:1")]);
    }

    #[test]
    fn test_exported_function_declaration_is_anonymous() {
        let src = "export function load() {\n  return Promise.await(get());\n}\n";
        let out = rewrite(src);

        assert_eq!(out.code, src);
        assert_eq!(out.report.ignored_promise_awaits.len(), 1);
    }

    #[test]
    fn test_named_callback_is_skipped() {
        let src = "items.forEach(function each(i) {\n  Promise.await(save(i));\n});\n";
        let out = rewrite(src);

        assert_eq!(out.code, src);
        assert_eq!(out.rewritten, 0);
        assert_eq!(out.report.ignored_promise_awaits, vec![skip("1:14", "3:1")]);
    }

    #[test]
    fn test_binding_names_named_function_expression() {
        let src = "const load = function fetchOne() {\n  return Promise.await(get());\n};\n";
        let out = rewrite(src);

        assert_eq!(
            out.code,
            "const load = async function fetchOne() {\n  return await Promise.await(get());\n};\n"
        );
        assert_eq!(out.report.converted_functions[0].name, "load");
    }

    #[test]
    fn test_function_expression_assigned_to_member() {
        let src = "obj.load = function () {\n  return Promise.await(get());\n};\n";
        let out = rewrite(src);

        assert_eq!(
            out.code,
            "obj.load = async function () {\n  return await Promise.await(get());\n};\n"
        );
        assert_eq!(
            out.report.converted_functions,
            vec![conversion("obj.load", "FunctionExpression", "1:11", "3:1")]
        );
    }

    #[test]
    fn test_object_method_in_assigned_object() {
        let src = "api = {\n  load() {\n    return Promise.await(get());\n  },\n};\n";
        let out = rewrite(src);

        assert_eq!(
            out.code,
            "api = {\n  async load() {\n    return await Promise.await(get());\n  },\n};\n"
        );
        assert_eq!(
            out.report.converted_functions,
            vec![conversion("api.load", "ObjectMethod", "2:2", "4:3")]
        );
    }

    #[test]
    fn test_object_method_in_declared_object_uses_key() {
        let src = "const api = {\n  load() {\n    return Promise.await(get());\n  },\n};\n";
        let out = rewrite(src);

        assert_eq!(out.report.converted_functions[0].name, "load");
    }

    #[test]
    fn test_object_property_arrow_uses_key() {
        let src = "const api = {\n  load: () => Promise.await(get()),\n};\n";
        let out = rewrite(src);

        assert_eq!(
            out.code,
            "const api = {\n  load: async () => await Promise.await(get()),\n};\n"
        );
        assert_eq!(out.report.converted_functions[0].name, "load");
    }

    #[test]
    fn test_anonymous_callback_is_skipped() {
        let src = "items.forEach(function (item) {\n  Promise.await(save(item));\n});\n";
        let out = rewrite(src);

        assert_eq!(out.code, src, "anonymous callbacks must be left untouched");
        assert_eq!(out.rewritten, 0);
        assert!(out.report.converted_functions.is_empty());
        assert_eq!(out.report.ignored_promise_awaits, vec![skip("1:14", "3:1")]);
    }

    #[test]
    fn test_anonymous_arrow_inside_named_function() {
        let src = "function saveAll(items) {\n  items.forEach((item) => Promise.await(save(item)));\n}\n";
        let out = rewrite(src);

        // The arrow is the enclosing function, not saveAll
        assert_eq!(out.code, src);
        assert_eq!(out.report.ignored_promise_awaits.len(), 1);
        assert!(out.report.converted_functions.is_empty());
    }

    #[test]
    fn test_two_calls_one_record() {
        let src = "const main = function () {\n  Promise.await(one());\n  Promise.await(two());\n};\n";
        let out = rewrite(src);

        assert_eq!(
            out.code,
            "const main = async function () {\n  await Promise.await(one());\n  await Promise.await(two());\n};\n"
        );
        assert_eq!(out.rewritten, 2);
        assert_eq!(out.report.converted_functions.len(), 1);
    }

    #[test]
    fn test_already_async_function() {
        let src = "const main = async function () {\n  const a = Promise.await(one());\n  return Promise.await(two(a));\n};\n";
        let out = rewrite(src);

        assert_eq!(
            out.code,
            "const main = async function () {\n  const a = await Promise.await(one());\n  return await Promise.await(two(a));\n};\n"
        );
        assert_eq!(
            out.report.converted_functions,
            vec![conversion("main", "FunctionExpression", "1:13", "4:1")]
        );
    }

    #[test]
    fn test_member_access_is_parenthesized() {
        let src = "const f = function (p) {\n  return Promise.await(p).value;\n};\n";
        let out = rewrite(src);

        assert_eq!(out.code, "const f = async function (p) {\n  return (await Promise.await(p)).value;\n};\n");
    }

    #[test]
    fn test_callee_is_parenthesized() {
        let src = "const f = function () {\n  return Promise.await(getFn())();\n};\n";
        let out = rewrite(src);

        assert_eq!(out.code, "const f = async function () {\n  return (await Promise.await(getFn()))();\n};\n");
    }

    #[test]
    fn test_exponent_base_is_parenthesized() {
        let src = "const f = function (p) {\n  return Promise.await(p) ** 2;\n};\n";
        let out = rewrite(src);

        assert_eq!(out.code, "const f = async function (p) {\n  return (await Promise.await(p)) ** 2;\n};\n");
    }

    #[test]
    fn test_nested_calls() {
        let src = "const f = function () {\n  return Promise.await(Promise.await(a).b);\n};\n";
        let out = rewrite(src);

        assert_eq!(
            out.code,
            "const f = async function () {\n  return await Promise.await((await Promise.await(a)).b);\n};\n"
        );
        assert_eq!(out.rewritten, 2);
        assert_eq!(out.report.converted_functions.len(), 1);
    }

    #[test]
    fn test_nested_function_scopes() {
        let src = "function outer() {\n  const inner = () => Promise.await(x);\n  return inner;\n}\n";
        let out = rewrite(src);

        assert_eq!(
            out.code,
            "function outer() {\n  const inner = async () => await Promise.await(x);\n  return inner;\n}\n"
        );
        assert_eq!(out.report.converted_functions[0].name, "inner");
    }

    #[test]
    fn test_generator_method() {
        let src = "const api = {\n  *items() {\n    yield Promise.await(next());\n  },\n};\n";
        let out = rewrite(src);

        assert_eq!(
            out.code,
            "const api = {\n  async *items() {\n    yield await Promise.await(next());\n  },\n};\n"
        );
    }

    #[test]
    fn test_generator_star_behind_comment() {
        let src = "const api = {\n  * /* lazy */ items() {\n    yield Promise.await(next());\n  },\n  *// rows\n  rows() {\n    yield Promise.await(more());\n  },\n};\n";
        let out = rewrite(src);

        assert_eq!(
            out.code,
            "const api = {\n  async * /* lazy */ items() {\n    yield await Promise.await(next());\n  },\n  async *// rows\n  rows() {\n    yield await Promise.await(more());\n  },\n};\n"
        );

        let again = rewrite(&out.code);
        assert_eq!(again.code, out.code);
        assert_eq!(again.rewritten, 0);
    }

    #[test]
    fn test_class_methods() {
        let src = "class Store {\n  load(id) {\n    return Promise.await(this.db.get(id));\n  }\n  static open() {\n    return Promise.await(connect());\n  }\n}\n";
        let out = rewrite(src);

        assert_eq!(
            out.code,
            "class Store {\n  async load(id) {\n    return await Promise.await(this.db.get(id));\n  }\n  static async open() {\n    return await Promise.await(connect());\n  }\n}\n"
        );
        assert_eq!(
            out.report.converted_functions,
            vec![
                conversion("load", "ClassMethod", "2:2", "4:3"),
                conversion("open", "ClassMethod", "5:2", "7:3"),
            ]
        );
    }

    #[test]
    fn test_private_method() {
        let src = "class Store {\n  #load() {\n    return Promise.await(get());\n  }\n}\n";
        let out = rewrite(src);

        assert_eq!(
            out.code,
            "class Store {\n  async #load() {\n    return await Promise.await(get());\n  }\n}\n"
        );
        assert_eq!(out.report.converted_functions[0].name, "#load");
        assert_eq!(out.report.converted_functions[0].kind, "ClassPrivateMethod");
    }

    #[test]
    fn test_class_property_arrow() {
        let src = "class View {\n  render = () => {\n    Promise.await(paint());\n  };\n}\n";
        let out = rewrite(src);

        assert_eq!(
            out.code,
            "class View {\n  render = async () => {\n    await Promise.await(paint());\n  };\n}\n"
        );
        assert_eq!(out.report.converted_functions[0].name, "render");
    }

    #[test]
    fn test_accessors_and_constructors_are_skipped() {
        let src = "class A {\n  constructor() {\n    Promise.await(init());\n  }\n  get value() {\n    return Promise.await(this.p);\n  }\n  field = Promise.await(x);\n  static {\n    Promise.await(boot());\n  }\n}\n";
        let out = rewrite(src);

        assert_eq!(out.code, src);
        assert_eq!(out.rewritten, 0);
        assert_eq!(out.report.ignored_promise_awaits.len(), 4);
        assert_eq!(out.report.ignored_promise_awaits[1], skip("5:2", "7:3"));
    }

    #[test]
    fn test_top_level_call_is_skipped() {
        let src = "Promise.await(init());\n";
        let out = rewrite(src);

        assert_eq!(out.code, src);
        assert_eq!(out.report.ignored_promise_awaits.len(), 1);
        assert_eq!(out.report.ignored_promise_awaits[0].start, "1:0");
    }

    #[test]
    fn test_lookalikes_are_ignored() {
        let src = "function f(q) {\n  q.await(x);\n  Promise.all(x);\n  Promise?.await(x);\n  Promise['await'](x);\n}\n";
        let out = rewrite(src);

        assert_eq!(out.code, src);
        assert_eq!(out.rewritten, 0);
        assert!(out.report.converted_functions.is_empty());
        assert!(out.report.ignored_promise_awaits.is_empty());
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let src = "const f = function (p) {\n  const v = Promise.await(p).value;\n  return Promise.await(next(v));\n};\n";
        let first = rewrite(src);
        let second = rewrite(&first.code);

        assert_eq!(second.code, first.code);
        assert_eq!(second.rewritten, 0);
        assert!(second.report.converted_functions.is_empty());
        assert!(second.report.ignored_promise_awaits.is_empty());
    }

    #[test]
    fn test_comments_and_layout_survive() {
        let src = "// header\nconst f = function () {\n  /* keep */ return Promise.await(x); // trailing\n\n\n};\n";
        let out = rewrite(src);

        assert_eq!(
            out.code,
            "// header\nconst f = async function () {\n  /* keep */ return await Promise.await(x); // trailing\n\n\n};\n"
        );
    }

    #[test]
    fn test_nothing_to_rewrite() {
        let src = "function f() {\n  return fetch(x);\n}\n";
        let out = rewrite(src);

        assert_eq!(out.code, src);
        assert_eq!(out.rewritten, 0);
        assert!(out.report.converted_functions.is_empty());
    }

    #[test]
    fn test_custom_pattern() {
        let pattern = CallPattern {
            namespace: "Fiber".to_string(),
            method: "wait".to_string(),
        };
        let src = "const f = function () {\n  Fiber.wait(a);\n  Promise.await(b);\n};\n";
        let out = rewrite_with(src, "test.js", &pattern);

        assert_eq!(out.code, "const f = async function () {\n  await Fiber.wait(a);\n  Promise.await(b);\n};\n");
        assert_eq!(out.rewritten, 1);
    }

    #[test]
    fn test_typescript_source() {
        let src = "const load = function (id: string): Promise<Item> {\n  return Promise.await(db.get(id))!;\n};\n";
        let out = rewrite_with(src, "store.ts", &CallPattern::default());

        // The non-null assertion is transparent, so no parentheses are added
        assert_eq!(
            out.code,
            "const load = async function (id: string): Promise<Item> {\n  return await Promise.await(db.get(id))!;\n};\n"
        );
    }

    #[test]
    fn test_tree_is_marked_async() {
        let src = "const load = function () {\n  return Promise.await(get());\n};\n";
        let cm: Lrc<SourceMap> = Default::default();
        let mut parsed = parse_source(src, &cm, "test.js").unwrap();
        let outcome = rewrite_module(&mut parsed, src, &cm, &CallPattern::default());
        assert_eq!(outcome.rewritten, 1);

        match &parsed.module.body[0] {
            ModuleItem::Stmt(Stmt::Decl(Decl::Var(var))) => match var.decls[0].init.as_deref() {
                Some(Expr::Fn(fn_expr)) => {
                    assert!(fn_expr.function.is_async, "function expression should be marked async");
                }
                other => panic!("expected function expression, got {:?}", other),
            },
            other => panic!("expected variable declaration, got {:?}", other),
        }
    }
}
